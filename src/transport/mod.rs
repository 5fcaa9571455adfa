pub mod handlers;
pub mod http_server;
pub mod proxy_client;
