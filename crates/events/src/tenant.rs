use stockplan_core::TenantId;

/// Helper trait for tenant-scoped messages.
///
/// Marks types carrying an associated tenant ID, enabling tenant-aware
/// processing in consumers (filtering a subscription loop to one tenant,
/// validating that a message belongs to the expected tenant).
pub trait TenantScoped {
    fn tenant_id(&self) -> TenantId;
}
