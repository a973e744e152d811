#[cfg(test)]
use std::sync::Mutex;

// ---------------------------------------------------------------------------
// Targets
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TargetKind {
    /// Floating popup next to the field (`<field>_popup`).
    Popup,
    /// Read-only suggestion box under the field (`<field>_suggestion`).
    Suggestion,
    /// Inline hint under the field (`<field>_hint`).
    Hint,
    /// Blocking dialog (summaries and alerts).
    Dialog,
}

/// Where a result lands.  Field targets are named after the field so the
/// same identifier addresses the input, the blob key and the output.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct OutputTarget {
    pub kind: TargetKind,
    pub id: String,
}

impl OutputTarget {
    pub fn for_field(kind: TargetKind, field: &str) -> Self {
        let id = match kind {
            TargetKind::Popup => format!("{field}_popup"),
            TargetKind::Suggestion => format!("{field}_suggestion"),
            TargetKind::Hint => format!("{field}_hint"),
            TargetKind::Dialog => field.to_string(),
        };
        Self { kind, id }
    }

    pub fn dialog(title: &str) -> Self {
        Self {
            kind: TargetKind::Dialog,
            id: title.to_string(),
        }
    }

    /// Modal used for errors on screens that report failures by alert.
    pub fn alert() -> Self {
        Self::dialog("Error")
    }
}

// ---------------------------------------------------------------------------
// Rendered content
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rendered {
    /// Placeholder shown while the round trip is outstanding.
    Pending(String),
    Text(String),
    Error(String),
    /// A newer activation of the same target was issued; nothing shown.
    Discarded,
}

impl Rendered {
    /// Text as the user sees it.
    pub fn display_text(&self) -> String {
        match self {
            Rendered::Pending(p) => p.clone(),
            Rendered::Text(t) => t.clone(),
            Rendered::Error(e) => format!("Error: {e}"),
            Rendered::Discarded => String::new(),
        }
    }

    #[cfg(test)]
    pub fn is_error(&self) -> bool {
        matches!(self, Rendered::Error(_))
    }
}

// ---------------------------------------------------------------------------
// Output surface
// ---------------------------------------------------------------------------

/// Receives everything the controller renders.
pub trait OutputSurface: Send + Sync {
    fn show(&self, target: &OutputTarget, content: &Rendered);
}

/// Prints to stdout.  Used by the CLI.
pub struct ConsoleSurface;

impl OutputSurface for ConsoleSurface {
    fn show(&self, target: &OutputTarget, content: &Rendered) {
        match (target.kind, content) {
            (_, Rendered::Discarded) => {}
            (TargetKind::Dialog, _) => {
                println!("== {} ==\n\n{}\n", target.id, content.display_text());
            }
            _ => println!("[{}] {}", target.id, content.display_text()),
        }
    }
}

/// Records every render; the latest entry per target is what a user would
/// currently see.
#[cfg(test)]
#[derive(Default)]
pub struct MemorySurface {
    shown: Mutex<Vec<(OutputTarget, Rendered)>>,
}

#[cfg(test)]
impl MemorySurface {
    pub fn new() -> Self {
        Self::default()
    }

    /// Last content rendered to the target with this id.
    pub fn current(&self, id: &str) -> Option<Rendered> {
        let shown = self.shown.lock().unwrap_or_else(|e| e.into_inner());
        shown
            .iter()
            .rev()
            .find(|(t, _)| t.id == id)
            .map(|(_, r)| r.clone())
    }

    pub fn history(&self) -> Vec<(OutputTarget, Rendered)> {
        self.shown.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

#[cfg(test)]
impl OutputSurface for MemorySurface {
    fn show(&self, target: &OutputTarget, content: &Rendered) {
        if *content == Rendered::Discarded {
            return;
        }
        self.shown
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push((target.clone(), content.clone()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn field_target_ids() {
        assert_eq!(OutputTarget::for_field(TargetKind::Popup, "knowledge").id, "knowledge_popup");
        assert_eq!(
            OutputTarget::for_field(TargetKind::Suggestion, "special_tests").id,
            "special_tests_suggestion"
        );
        assert_eq!(OutputTarget::for_field(TargetKind::Hint, "red_flags").id, "red_flags_hint");
        assert_eq!(OutputTarget::alert().kind, TargetKind::Dialog);
    }

    #[test]
    fn display_text_prefixes_errors() {
        assert_eq!(Rendered::Text("ok".into()).display_text(), "ok");
        assert_eq!(Rendered::Error("model timeout".into()).display_text(), "Error: model timeout");
        assert!(Rendered::Error("x".into()).is_error());
    }

    #[test]
    fn memory_surface_tracks_latest_per_target() {
        let s = MemorySurface::new();
        let a = OutputTarget::for_field(TargetKind::Popup, "a");
        let b = OutputTarget::for_field(TargetKind::Popup, "b");
        s.show(&a, &Rendered::Pending("Thinking…".into()));
        s.show(&b, &Rendered::Text("b1".into()));
        s.show(&a, &Rendered::Text("a1".into()));
        s.show(&a, &Rendered::Discarded);

        assert_eq!(s.current("a_popup"), Some(Rendered::Text("a1".into())));
        assert_eq!(s.current("b_popup"), Some(Rendered::Text("b1".into())));
        assert_eq!(s.current("c_popup"), None);
        assert_eq!(s.history().len(), 3);
    }
}
