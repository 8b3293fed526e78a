use clap::{Args, Subcommand};
use input_replay::MouseButton;

#[derive(Subcommand, Clone, Debug)]
pub enum Commands {
    /// Evaluate a JavaScript expression and print its value as JSON
    Eval(EvalArgs),

    /// Click the element matching a selector
    Click(ClickArgs),

    /// Tap the element matching a selector
    Tap(SelectorArgs),

    /// Focus an element and type text into it
    Type(TypeArgs),

    /// Press a key, optionally after focusing an element
    Press(PressArgs),

    /// Wait for a selector to appear, become visible, or go away
    WaitFor(WaitForArgs),

    /// Move the mouse pointer
    Move(MoveArgs),
}

#[derive(Args, Clone, Debug)]
pub struct EvalArgs {
    /// Expression to evaluate; promises are awaited
    pub expression: String,
}

#[derive(Args, Clone, Debug)]
pub struct SelectorArgs {
    /// CSS selector
    pub selector: String,
}

#[derive(Args, Clone, Debug)]
pub struct ClickArgs {
    /// CSS selector
    pub selector: String,

    /// Mouse button
    #[arg(long, default_value = "left")]
    pub button: MouseButton,

    /// Click count (2 for a double click)
    #[arg(long, default_value_t = 1)]
    pub count: u32,

    /// Pause between press and release
    #[arg(long)]
    pub delay_ms: Option<u64>,
}

#[derive(Args, Clone, Debug)]
pub struct TypeArgs {
    /// CSS selector of the element to focus
    pub selector: String,

    /// Text to type
    pub text: String,

    /// Pause between characters
    #[arg(long)]
    pub delay_ms: Option<u64>,
}

#[derive(Args, Clone, Debug)]
pub struct PressArgs {
    /// Key name from the US layout (`Enter`, `ArrowDown`, `a`, ...)
    pub key: String,

    /// Focus this element first
    #[arg(long)]
    pub selector: Option<String>,

    /// Hold the key this long
    #[arg(long)]
    pub delay_ms: Option<u64>,
}

#[derive(Args, Clone, Debug)]
pub struct WaitForArgs {
    /// CSS selector
    pub selector: String,

    /// Require the element to be visible
    #[arg(long, conflicts_with = "hidden")]
    pub visible: bool,

    /// Wait for the element to be hidden or removed
    #[arg(long)]
    pub hidden: bool,

    /// Overrides `wait_timeout_ms` from the config file
    #[arg(long)]
    pub timeout_ms: Option<u64>,
}

#[derive(Args, Clone, Debug)]
pub struct MoveArgs {
    pub x: f64,
    pub y: f64,

    /// Number of interpolated mouseMoved events
    #[arg(long, default_value_t = 1)]
    pub steps: u32,
}
