pub mod bubble;
pub mod components;
pub mod config;
pub mod conversation;
pub mod dialogue;
pub mod error;
pub mod events;
pub mod font;
pub mod geometry;
pub mod highlight;
pub mod loading;
pub mod panel;
pub mod placement;
pub mod render;
pub mod scene;
pub mod text;
pub mod transform;
pub mod ui;
