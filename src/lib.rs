pub mod credentials;
pub mod lister;
pub mod listing;
pub mod output;
