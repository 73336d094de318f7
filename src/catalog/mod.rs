//! Sample record types served by the `respite` binary.

pub mod order;
pub mod product;

pub use order::Order;
pub use product::Product;

use crate::access::RoleTable;
use crate::resource::ResourceRegistry;

/// Registry with `user`, `product` (global) and `order` (owned).
pub fn registry() -> ResourceRegistry {
    let mut registry = ResourceRegistry::with_users();
    registry.register_global::<Product>().register_owned::<Order>();
    registry
}

/// Role table used when no role file is configured.
pub fn default_roles() -> RoleTable {
    RoleTable::new()
        .with_role(
            "Customer",
            ["order.read", "order.write", "product.read", "user.read"],
        )
        .with_role(
            "Admin",
            [
                "order.read",
                "order.write",
                "order.global",
                "product.read",
                "product.write",
                "user.read",
                "user.write",
            ],
        )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access::{authorized, Action};

    #[test]
    fn customers_cannot_see_other_orders_or_edit_products() {
        let perms = default_roles().expand(&["Customer"]);
        assert!(authorized("order", Action::Write, &perms));
        assert!(!authorized("order", Action::Global, &perms));
        assert!(!authorized("product", Action::Write, &perms));
    }

    #[test]
    fn admins_hold_order_global() {
        let perms = default_roles().expand(&["Admin"]);
        assert!(authorized("order", Action::Global, &perms));
    }
}
