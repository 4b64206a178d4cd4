//! Synthesized names for objects the source schema never named.

/// Per-run counter for synthesized index names.
///
/// Owned by the [`Rewriter`](crate::rewriter::Rewriter) for exactly one batch,
/// so converting the same input twice yields the same names. Never global.
#[derive(Debug, Default)]
pub struct NamingContext {
    next: u32,
}

impl NamingContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Next synthesized index name for `table`: `idx_<table>_<n>`.
    pub fn index_name(&mut self, table: &str) -> String {
        self.next += 1;
        format!("idx_{}_{}", table, self.next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names_are_unique_within_a_run() {
        let mut naming = NamingContext::new();
        assert_eq!(naming.index_name("users"), "idx_users_1");
        assert_eq!(naming.index_name("users"), "idx_users_2");
        assert_eq!(naming.index_name("orders"), "idx_orders_3");
    }

    #[test]
    fn test_fresh_context_restarts() {
        let mut a = NamingContext::new();
        let mut b = NamingContext::new();
        assert_eq!(a.index_name("t"), b.index_name("t"));
    }
}
