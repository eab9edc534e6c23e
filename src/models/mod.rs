pub mod armada;
pub mod dispatch;
pub mod driver;
pub mod order;
pub mod rating;
pub mod training;
pub mod user;
