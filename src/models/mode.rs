/// Whether the viewing surface is currently on screen.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Default)]
pub enum Mode {
    #[default]
    Foreground,
    Background
}
