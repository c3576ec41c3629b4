pub mod health_controller;
pub mod playback_controller;
pub mod proxy_controller;
