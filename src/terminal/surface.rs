// ABOUTME: Output side of a terminal emulator surface
// Anything that can render raw shell output implements TerminalSurface

use tokio::sync::mpsc;

/// Receives raw shell output, ANSI sequences included, in arrival order.
pub trait TerminalSurface: Send + 'static {
    /// Render one chunk of output.
    fn write(&mut self, data: &str);
}

impl TerminalSurface for mpsc::UnboundedSender<String> {
    fn write(&mut self, data: &str) {
        // A closed receiver means the surface is gone; output is discarded
        let _ = self.send(data.to_string());
    }
}

impl TerminalSurface for Box<dyn TerminalSurface> {
    fn write(&mut self, data: &str) {
        (**self).write(data);
    }
}
