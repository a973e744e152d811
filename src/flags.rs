use crate::context::{CompositeContext, Section};

pub const YELLOW: &str = "yellow_flags";
pub const BLACK: &str = "black_flags";

/// Flag blocks to highlight on the clinical flags screen, in display order.
///
/// - yellow: subjective pain irritability recorded as `Present`
/// - black: special tests marked `Absolutely Contraindicated`
pub fn highlights(ctx: &CompositeContext) -> Vec<&'static str> {
    let mut out = Vec::new();

    if ctx.section_str(Section::Subjective, "pain_irritability") == Some("Present") {
        out.push(YELLOW);
    }

    let special_tests = ctx
        .section(Section::Assessments)
        .and_then(|a| a.get("special_tests"))
        .and_then(|t| t.get("choice"))
        .and_then(|c| c.as_str());
    if special_tests == Some("Absolutely Contraindicated") {
        out.push(BLACK);
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::build;
    use crate::store::{ContextStore, MemoryStore, ScreenBlob, names};
    use serde_json::json;

    const ALL: &[Section] = &[Section::Subjective, Section::Perspectives, Section::Assessments];

    fn blob(v: serde_json::Value) -> ScreenBlob {
        v.as_object().cloned().unwrap()
    }

    #[tokio::test]
    async fn nothing_recorded_nothing_highlighted() {
        let store = MemoryStore::new();
        let ctx = build(&store, ALL).await.unwrap();
        assert!(highlights(&ctx).is_empty());
    }

    #[tokio::test]
    async fn both_flags_in_order() {
        let store = MemoryStore::new();
        store
            .set(names::ASSESSMENTS, &blob(json!({"special_tests": {"choice": "Absolutely Contraindicated"}})))
            .await
            .unwrap();
        store
            .set(names::SUBJECTIVE, &blob(json!({"pain_irritability": "Present"})))
            .await
            .unwrap();
        let ctx = build(&store, ALL).await.unwrap();
        assert_eq!(highlights(&ctx), vec![YELLOW, BLACK]);
    }

    #[tokio::test]
    async fn other_values_do_not_highlight() {
        let store = MemoryStore::new();
        store
            .set(names::ASSESSMENTS, &blob(json!({"special_tests": "Absolutely Contraindicated"})))
            .await
            .unwrap();
        store
            .set(names::SUBJECTIVE, &blob(json!({"pain_irritability": "Absent"})))
            .await
            .unwrap();
        let ctx = build(&store, ALL).await.unwrap();
        assert!(highlights(&ctx).is_empty());
    }
}
