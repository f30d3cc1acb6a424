use crate::{
    models::page::Cursor,
    providers::{clover_rest::response as clover, square_rest::response as square},
};

#[derive(Debug, Clone)]
pub enum ProviderCustomer {
    Square(square::Customer),
    Clover(clover::Customer),
}

impl ProviderCustomer {
    pub fn id(&self) -> &str {
        match self {
            ProviderCustomer::Square(c) => &c.id,
            ProviderCustomer::Clover(c) => &c.id,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CustomerPage {
    pub customers: Vec<ProviderCustomer>,
    pub next: Option<Cursor>,
}
