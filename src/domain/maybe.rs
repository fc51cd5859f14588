//! Combinators for "value not available yet" propagation.
//!
//! Every derived trading quantity is an `Option`: when a quote, an on-chain read or
//! a user input is missing, the result is `None` rather than an error. These helpers
//! combine several optional operands and short-circuit on the first missing one.

/// Apply `f` when both operands are present.
pub fn map2<A, B, R>(a: Option<A>, b: Option<B>, f: impl FnOnce(A, B) -> Option<R>) -> Option<R> {
    f(a?, b?)
}

/// Apply `f` when all three operands are present.
pub fn map3<A, B, C, R>(
    a: Option<A>,
    b: Option<B>,
    c: Option<C>,
    f: impl FnOnce(A, B, C) -> Option<R>,
) -> Option<R> {
    f(a?, b?, c?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_map2_short_circuits() {
        assert_eq!(map2(Some(1), Some(2), |a, b| Some(a + b)), Some(3));
        assert_eq!(map2(None::<i32>, Some(2), |a, b| Some(a + b)), None);
        assert_eq!(map2(Some(1), None::<i32>, |a, b| Some(a + b)), None);
    }

    #[test]
    fn test_map3_short_circuits() {
        assert_eq!(map3(Some(1), Some(2), Some(3), |a, b, c| Some(a * b * c)), Some(6));
        assert_eq!(map3(Some(1), None::<i32>, Some(3), |a, b, c| Some(a * b * c)), None);
    }

    #[test]
    fn test_inner_none_propagates() {
        assert_eq!(map2(Some(1), Some(0), |a: i32, b: i32| a.checked_div(b)), None);
    }
}
