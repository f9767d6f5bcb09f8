pub mod car_record;
pub mod edit_request;
pub mod user;
