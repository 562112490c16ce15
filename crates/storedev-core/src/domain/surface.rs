//! Mapping from extension point targets to the host surface that renders them.

/// Surface that renders a given extension point target.
///
/// Returns `None` for targets that belong to no known surface.
pub fn extension_point_target_surface(target: &str) -> Option<&'static str> {
    let namespace = target.split(['.', ':']).next().unwrap_or_default();

    match namespace {
        "admin" => Some("admin"),
        "Checkout" => Some("checkout"),
        "purchase" => {
            if target.starts_with("purchase.checkout.") {
                Some("checkout")
            } else if target.starts_with("purchase.post.") {
                Some("post_purchase")
            } else {
                None
            }
        }
        "customer-account" => {
            if target.starts_with("customer-account.order-details.") {
                Some("checkout")
            } else {
                Some("customer-accounts")
            }
        }
        "retail" => Some("point_of_sale"),
        _ => None,
    }
}
