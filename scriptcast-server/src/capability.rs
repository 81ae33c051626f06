//! The capability surface bound into the scripting runtime.
//!
//! An embedded interpreter calls host functions by name. Instead of
//! reflective lookup, every capability is an explicit entry in a
//! [`CapabilityTable`]: name → strongly-typed handler function,
//! registered once at session start. The embedding layer resolves
//! the name a single time when it binds the script's globals and
//! then dispatches straight through the function pointer.

use std::collections::HashMap;

use futures::future::BoxFuture;

use scriptcast_core::CastError;

use crate::host::SessionHost;

// ── Values ───────────────────────────────────────────────────────

/// A value crossing the script/host boundary.
#[derive(Debug, Clone, PartialEq)]
pub enum ScriptValue {
    Text(String),
    Number(f64),
    Bool(bool),
}

impl ScriptValue {
    /// Render the value the way `print` displays it.
    pub fn render(&self) -> String {
        match self {
            ScriptValue::Text(s) => s.clone(),
            ScriptValue::Number(n) => {
                // Whole numbers print without a trailing ".0".
                if n.fract() == 0.0 && n.is_finite() {
                    format!("{}", *n as i64)
                } else {
                    format!("{n}")
                }
            }
            ScriptValue::Bool(b) => b.to_string(),
        }
    }
}

/// Positional arguments for one capability call.
#[derive(Debug, Clone, Default)]
pub struct CapabilityArgs(Vec<ScriptValue>);

impl CapabilityArgs {
    pub fn new(values: Vec<ScriptValue>) -> Self {
        Self(values)
    }

    pub fn none() -> Self {
        Self(Vec::new())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Every argument rendered to text, for `print`.
    pub fn render_all(&self) -> Vec<String> {
        self.0.iter().map(ScriptValue::render).collect()
    }

    fn get(&self, index: usize, capability: &'static str) -> Result<&ScriptValue, CastError> {
        self.0.get(index).ok_or(CastError::Script(format!(
            "{capability}: missing argument {index}"
        )))
    }

    pub fn text(&self, index: usize, capability: &'static str) -> Result<String, CastError> {
        match self.get(index, capability)? {
            ScriptValue::Text(s) => Ok(s.clone()),
            other => Err(CastError::Script(format!(
                "{capability}: argument {index} must be text, got {other:?}"
            ))),
        }
    }

    pub fn number(&self, index: usize, capability: &'static str) -> Result<f64, CastError> {
        match self.get(index, capability)? {
            ScriptValue::Number(n) => Ok(*n),
            other => Err(CastError::Script(format!(
                "{capability}: argument {index} must be a number, got {other:?}"
            ))),
        }
    }

    pub fn boolean(&self, index: usize, capability: &'static str) -> Result<bool, CastError> {
        match self.get(index, capability)? {
            ScriptValue::Bool(b) => Ok(*b),
            other => Err(CastError::Script(format!(
                "{capability}: argument {index} must be a boolean, got {other:?}"
            ))),
        }
    }
}

/// What a capability call hands back to the script.
#[derive(Debug, Clone, PartialEq)]
pub enum CapabilityValue {
    Unit,
    Bool(bool),
    Text(String),
}

// ── Table ────────────────────────────────────────────────────────

/// Handler signature: borrows the host for the duration of the call.
pub type CapabilityFn =
    for<'a> fn(&'a mut SessionHost, CapabilityArgs) -> BoxFuture<'a, Result<CapabilityValue, CastError>>;

/// Name → handler map, built once per session.
pub struct CapabilityTable {
    entries: HashMap<&'static str, CapabilityFn>,
}

impl CapabilityTable {
    /// The standard capability set exposed to every script.
    pub fn standard() -> Self {
        let mut entries: HashMap<&'static str, CapabilityFn> = HashMap::new();
        entries.insert("print", cap_print);
        entries.insert("wait", cap_wait);
        entries.insert("set_auto_newline", cap_set_auto_newline);
        entries.insert("set_compression", cap_set_compression);
        entries.insert("clear_screen", cap_clear_screen);
        entries.insert("cursor_home", cap_cursor_home);
        entries.insert("get_args", cap_get_args);
        entries.insert("ask_assistant", cap_ask_assistant);
        entries.insert("play", cap_play);
        entries.insert("stop_all_playback", cap_stop_all_playback);
        entries.insert("get_script_directory", cap_get_script_directory);
        Self { entries }
    }

    /// Look up a handler for binding into the interpreter's globals.
    pub fn get(&self, name: &str) -> Option<CapabilityFn> {
        self.entries.get(name).copied()
    }

    /// All registered capability names.
    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.entries.keys().copied()
    }

    /// Dispatch a call by name.
    pub async fn invoke(
        &self,
        host: &mut SessionHost,
        name: &str,
        args: CapabilityArgs,
    ) -> Result<CapabilityValue, CastError> {
        match self.get(name) {
            Some(handler) => handler(host, args).await,
            None => Err(CastError::Script(format!("unknown capability: {name}"))),
        }
    }
}

impl Default for CapabilityTable {
    fn default() -> Self {
        Self::standard()
    }
}

// ── Handlers ─────────────────────────────────────────────────────

fn cap_print(
    host: &mut SessionHost,
    args: CapabilityArgs,
) -> BoxFuture<'_, Result<CapabilityValue, CastError>> {
    Box::pin(async move {
        host.print(&args.render_all()).await?;
        Ok(CapabilityValue::Unit)
    })
}

fn cap_wait(
    host: &mut SessionHost,
    args: CapabilityArgs,
) -> BoxFuture<'_, Result<CapabilityValue, CastError>> {
    Box::pin(async move {
        let millis = args.number(0, "wait")?;
        if !(0.0..=u64::MAX as f64).contains(&millis) {
            return Err(CastError::Script("wait: negative duration".into()));
        }
        host.wait(millis as u64).await;
        Ok(CapabilityValue::Unit)
    })
}

fn cap_set_auto_newline(
    host: &mut SessionHost,
    args: CapabilityArgs,
) -> BoxFuture<'_, Result<CapabilityValue, CastError>> {
    Box::pin(async move {
        host.set_auto_newline(args.boolean(0, "set_auto_newline")?);
        Ok(CapabilityValue::Unit)
    })
}

fn cap_set_compression(
    host: &mut SessionHost,
    args: CapabilityArgs,
) -> BoxFuture<'_, Result<CapabilityValue, CastError>> {
    Box::pin(async move {
        let enabled = args.boolean(0, "set_compression")?;
        let changed = host.set_compression(enabled).await;
        Ok(CapabilityValue::Bool(changed))
    })
}

fn cap_clear_screen(
    host: &mut SessionHost,
    _args: CapabilityArgs,
) -> BoxFuture<'_, Result<CapabilityValue, CastError>> {
    Box::pin(async move {
        host.clear_screen().await;
        Ok(CapabilityValue::Unit)
    })
}

fn cap_cursor_home(
    host: &mut SessionHost,
    _args: CapabilityArgs,
) -> BoxFuture<'_, Result<CapabilityValue, CastError>> {
    Box::pin(async move {
        host.cursor_home().await;
        Ok(CapabilityValue::Unit)
    })
}

fn cap_get_args(
    host: &mut SessionHost,
    _args: CapabilityArgs,
) -> BoxFuture<'_, Result<CapabilityValue, CastError>> {
    Box::pin(async move { Ok(CapabilityValue::Text(host.args().to_string())) })
}

fn cap_ask_assistant(
    host: &mut SessionHost,
    args: CapabilityArgs,
) -> BoxFuture<'_, Result<CapabilityValue, CastError>> {
    Box::pin(async move {
        let question = args.text(0, "ask_assistant")?;
        let answer = host.ask_assistant(&question).await?;
        Ok(CapabilityValue::Text(answer))
    })
}

fn cap_play(
    host: &mut SessionHost,
    args: CapabilityArgs,
) -> BoxFuture<'_, Result<CapabilityValue, CastError>> {
    Box::pin(async move {
        let file = args.text(0, "play")?;
        Ok(CapabilityValue::Bool(host.play(&file).await))
    })
}

fn cap_stop_all_playback(
    host: &mut SessionHost,
    _args: CapabilityArgs,
) -> BoxFuture<'_, Result<CapabilityValue, CastError>> {
    Box::pin(async move {
        host.stop_all_playback().await;
        Ok(CapabilityValue::Unit)
    })
}

fn cap_get_script_directory(
    host: &mut SessionHost,
    _args: CapabilityArgs,
) -> BoxFuture<'_, Result<CapabilityValue, CastError>> {
    Box::pin(async move { Ok(CapabilityValue::Text(host.script_directory())) })
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::{DisabledAssistant, SilentAudio};
    use scriptcast_core::FrameKind;
    use std::sync::Arc;
    use tokio::sync::mpsc;

    fn host_with_channel() -> (SessionHost, mpsc::Receiver<scriptcast_core::Frame>) {
        let (tx, rx) = mpsc::channel(16);
        let host = SessionHost::new(
            tx,
            "--difficulty hard".to_string(),
            Arc::new(DisabledAssistant),
            Arc::new(SilentAudio),
        );
        (host, rx)
    }

    #[test]
    fn table_registers_the_full_capability_set() {
        let table = CapabilityTable::standard();
        let mut names: Vec<_> = table.names().collect();
        names.sort_unstable();
        assert_eq!(
            names,
            vec![
                "ask_assistant",
                "clear_screen",
                "cursor_home",
                "get_args",
                "get_script_directory",
                "play",
                "print",
                "set_auto_newline",
                "set_compression",
                "stop_all_playback",
                "wait",
            ]
        );
    }

    #[tokio::test]
    async fn print_dispatches_through_the_table() {
        let table = CapabilityTable::standard();
        let (mut host, mut rx) = host_with_channel();

        let args = CapabilityArgs::new(vec![
            ScriptValue::Text("score:".into()),
            ScriptValue::Number(42.0),
        ]);
        table.invoke(&mut host, "print", args).await.unwrap();

        let frame = rx.recv().await.unwrap();
        assert_eq!(frame.kind(), FrameKind::ScreenText);
        assert_eq!(frame.payload(), b"score: 42\n");
    }

    #[tokio::test]
    async fn get_args_returns_the_argument_string() {
        let table = CapabilityTable::standard();
        let (mut host, _rx) = host_with_channel();
        let value = table
            .invoke(&mut host, "get_args", CapabilityArgs::none())
            .await
            .unwrap();
        assert_eq!(value, CapabilityValue::Text("--difficulty hard".into()));
    }

    #[tokio::test]
    async fn unknown_capability_is_an_error() {
        let table = CapabilityTable::standard();
        let (mut host, _rx) = host_with_channel();
        let err = table
            .invoke(&mut host, "reboot_server", CapabilityArgs::none())
            .await
            .unwrap_err();
        assert!(matches!(err, CastError::Script(_)));
    }

    #[tokio::test]
    async fn wait_rejects_non_numeric_argument() {
        let table = CapabilityTable::standard();
        let (mut host, _rx) = host_with_channel();
        let err = table
            .invoke(
                &mut host,
                "wait",
                CapabilityArgs::new(vec![ScriptValue::Text("soon".into())]),
            )
            .await
            .unwrap_err();
        assert!(err.to_string().contains("wait"));
    }

    #[tokio::test]
    async fn set_compression_reports_status_change() {
        let table = CapabilityTable::standard();
        let (mut host, _rx) = host_with_channel();

        let on = CapabilityArgs::new(vec![ScriptValue::Bool(true)]);
        assert_eq!(
            table
                .invoke(&mut host, "set_compression", on.clone())
                .await
                .unwrap(),
            CapabilityValue::Bool(true)
        );
        // Second enable: unchanged.
        assert_eq!(
            table.invoke(&mut host, "set_compression", on).await.unwrap(),
            CapabilityValue::Bool(false)
        );
        host.shutdown().await;
    }

    #[test]
    fn number_rendering_matches_print_style() {
        assert_eq!(ScriptValue::Number(3.0).render(), "3");
        assert_eq!(ScriptValue::Number(3.5).render(), "3.5");
        assert_eq!(ScriptValue::Bool(true).render(), "true");
    }
}
