pub mod edge_services;
pub mod playlist_services;
pub mod relay_services;
pub mod storyboard_services;
pub mod twitch_gql_services;

pub use relay_services::DynRelayService;
pub use storyboard_services::DynStoryboardService;
pub use twitch_gql_services::DynTwitchGqlService;
