pub mod store;

pub use store::PortfolioStore;
