use crate::providers::{clover_rest::response as clover, square_rest::response as square};

/// A physical store as reported by the provider.
///
/// Clover exposes exactly one location per merchant, so its variant carries
/// the merchant record itself.
#[derive(Debug, Clone)]
pub enum ProviderLocation {
    Square(square::Location),
    Clover(clover::Merchant),
}

impl ProviderLocation {
    pub fn id(&self) -> &str {
        match self {
            ProviderLocation::Square(l) => &l.id,
            ProviderLocation::Clover(m) => &m.id,
        }
    }
}
