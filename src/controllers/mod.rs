pub mod admin_controller;
pub mod armada_controller;
pub mod auth_controller;
pub mod dispatch_controller;
pub mod driver_controller;
pub mod order_controller;
pub mod rating_controller;
pub mod training_controller;
