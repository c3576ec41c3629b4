pub mod health_dto;
pub mod playback_dto;
