// handlers/protected/mod.rs - Authenticated handlers for any principal
//
// Route Prefix: /api/me/*, /api/rabbitmq/:cluster/*
// Middleware: jwt_auth_middleware + validate_user_middleware

pub mod me; // GET /api/me/clusters
pub mod rabbitmq; // /api/rabbitmq/:cluster/*

pub use me::clusters as me_clusters;
