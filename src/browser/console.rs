//! Console relay
//!
//! Every `Runtime.consoleAPICalled` event from the page is written to stdout as one line, in arrival order.

use std::io::Write;

use chromiumoxide::cdp::js_protocol::runtime::{RemoteObject, RemoteObjectType};
use futures_util::{Stream, StreamExt};
use tokio::task::JoinHandle;

/// The message text: arguments joined by a space, as a console prints them.
pub fn console_text(args: &[RemoteObject]) -> String {
    args.iter().map(display_text).collect::<Vec<_>>().join(" ")
}

fn display_text(arg: &RemoteObject) -> String {
    match (&arg.value, &arg.unserializable_value, &arg.description) {
        (Some(serde_json::Value::String(s)), _, _) => s.clone(),
        (Some(value), _, _) => value.to_string(),
        (None, Some(raw), _) => raw.inner().clone(),
        (None, None, Some(description)) => description.clone(),
        (None, None, None) if matches!(arg.r#type, RemoteObjectType::Undefined) => "undefined".to_string(),
        (None, None, None) => String::new(),
    }
}

/// Write each line to `out` until the stream ends.
pub fn spawn_relay<S, W>(lines: S, mut out: W) -> JoinHandle<()>
where
    S: Stream<Item = String> + Send + 'static,
    W: Write + Send + 'static,
{
    tokio::spawn(async move {
        let mut lines = Box::pin(lines);
        while let Some(line) = lines.next().await {
            if let Err(e) = writeln!(out, "{line}").and_then(|()| out.flush()) {
                tracing::warn!(error = %e, "failed to relay console message");
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::{Arc, Mutex};

    fn remote(value: serde_json::Value) -> RemoteObject {
        serde_json::from_value(value).unwrap()
    }

    #[derive(Clone, Default)]
    struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

    impl Write for SharedBuffer {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_string_arguments_are_printed_raw() {
        let args = [remote(json!({ "type": "string", "value": "XSIMD WASM TESTS PASSED" }))];
        assert_eq!(console_text(&args), "XSIMD WASM TESTS PASSED");
    }

    #[test]
    fn test_arguments_are_space_joined() {
        let args = [
            remote(json!({ "type": "string", "value": "ran" })),
            remote(json!({ "type": "number", "value": 42 })),
            remote(json!({ "type": "bigint", "unserializableValue": "7n" })),
            remote(json!({ "type": "object", "description": "Array(2)" })),
            remote(json!({ "type": "undefined" })),
        ];
        assert_eq!(console_text(&args), "ran 42 7n Array(2) undefined");
    }

    #[test]
    fn test_no_arguments_is_empty_line() {
        assert_eq!(console_text(&[]), "");
    }

    #[tokio::test]
    async fn test_relay_writes_lines_in_order() {
        let out = SharedBuffer::default();
        let lines = futures_util::stream::iter(["first".to_string(), String::new(), "third".to_string()]);

        spawn_relay(lines, out.clone()).await.unwrap();

        let written = String::from_utf8(out.0.lock().unwrap().clone()).unwrap();
        assert_eq!(written, "first\n\nthird\n");
    }
}
