pub mod car_routes;
pub mod draft_routes;
pub mod edit_request_routes;
pub mod navigation_routes;
pub mod user_routes;
