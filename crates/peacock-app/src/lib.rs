// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

pub mod admin;
pub mod auth;
pub mod catalog;
pub mod detail;
pub mod forms;
pub mod ids;
pub mod model;
pub mod service;
pub mod state;

pub use admin::*;
pub use auth::*;
pub use catalog::*;
pub use detail::*;
pub use forms::*;
pub use ids::*;
pub use model::*;
pub use service::*;
pub use state::*;
