mod animation;
mod draw;
mod theme;

pub use animation::{Animator, Easing, ease};
pub use draw::{DrawList, PanelCommand, TextAlign, TextCommand, TriangleCommand};
pub use theme::Theme;
