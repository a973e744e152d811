use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};

use serde_json::{Map, Value, json};
use tracing::{debug, info, warn};

use crate::context::{self, CompositeContext};
use crate::display::{OutputSurface, OutputTarget, Rendered};
use crate::error::{ContextError, Result};
use crate::flags;
use crate::schema::{
    ErrorSurface, FieldSpec, INTAKE_FIELDS, Payload, Screen, ScreenSchema, SummaryShape, WriteMode,
};
use crate::store::{ContextStore, ScreenBlob, merge_field};
use crate::suggestion::{SuggestionCall, SuggestionTransport, resolve_segments};

const NO_SUGGESTION: &str = "No suggestion available.";

/// One clinician's pass through the workflow.
///
/// Holds the injected store, transport and output surface, and drives every
/// screen through the same steps: persist the value, rebuild the composite
/// context, request, render.
pub struct Session {
    store: Arc<dyn ContextStore>,
    transport: Arc<dyn SuggestionTransport>,
    surface: Arc<dyn OutputSurface>,
    patient_id: Option<String>,
    discard_superseded: bool,
    /// Latest activation number per output target id.
    generations: Mutex<HashMap<String, u64>>,
}

impl Session {
    pub fn new(
        store: Arc<dyn ContextStore>,
        transport: Arc<dyn SuggestionTransport>,
        surface: Arc<dyn OutputSurface>,
    ) -> Self {
        Self {
            store,
            transport,
            surface,
            patient_id: None,
            discard_superseded: false,
            generations: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_patient(mut self, patient_id: impl Into<String>) -> Self {
        let id = patient_id.into();
        self.patient_id = (!id.is_empty()).then_some(id);
        self
    }

    /// Only render a response if no newer activation of the same target was
    /// issued while it was in flight.
    pub fn discard_superseded(mut self, on: bool) -> Self {
        self.discard_superseded = on;
        self
    }

    pub fn patient(&self) -> Option<&str> {
        self.patient_id.as_deref()
    }

    /// Persist a value into the screen's blob without asking for a
    /// suggestion (form submit, checkbox groups, session details).
    pub async fn record(&self, screen: Screen, field: &str, value: Value) -> Result<ScreenBlob> {
        merge_field(self.store.as_ref(), screen.schema().blob, field, value).await
    }

    /// Composite context as the screen's requests would carry it.
    pub async fn context(&self, screen: Screen) -> Result<CompositeContext> {
        context::build(self.store.as_ref(), screen.schema().sections).await
    }

    /// Names of the blobs recorded so far.
    pub async fn stored_blobs(&self) -> Result<Vec<String>> {
        self.store.names().await
    }

    /// Flag blocks the clinical flags screen should highlight.
    pub async fn flag_highlights(&self) -> Result<Vec<&'static str>> {
        let ctx = self.context(Screen::ClinicalFlags).await?;
        Ok(flags::highlights(&ctx))
    }

    /// Field-level suggestion.
    ///
    /// Service and transport failures are rendered, not returned: the `Err`
    /// path is reserved for unknown screens/fields, a missing patient id,
    /// and store failures.
    pub async fn activate(&self, screen: Screen, field: &str, value: &str) -> Result<Rendered> {
        let schema = screen.schema();
        let spec = schema.field(field)?;
        let segments = resolve_segments(spec.endpoint, field, self.patient())?;
        let value = value.trim();

        let target = OutputTarget::for_field(spec.target, field);
        let ticket = self.issue(&target.id);

        let blob = self.write_field(schema, spec, value).await?;
        let previous = self.context(screen).await?;
        let call = field_call(spec, segments, &previous, &blob, value, self.patient());

        // After every local step: a store failure must not leave it showing.
        if let Some(placeholder) = spec.placeholder {
            self.surface.show(&target, &Rendered::Pending(placeholder.to_string()));
        }

        debug!(screen = %screen, field, path = %call.path(), ticket, "requesting field suggestion");
        let outcome = self.transport.request(&call).await;

        if !self.is_latest(&target.id, ticket) {
            debug!(screen = %screen, field, ticket, "dropping superseded response");
            return Ok(Rendered::Discarded);
        }
        Ok(self.render(&target, spec.errors, outcome))
    }

    /// Screen-wide summary or diagnosis, shown in a dialog.
    ///
    /// `values` are the screen's current form values; how they are merged
    /// into the blob depends on the summary shape.
    pub async fn summarize(&self, screen: Screen, values: &BTreeMap<String, String>) -> Result<Rendered> {
        let schema = screen.schema();
        let summary = schema
            .summary
            .ok_or_else(|| ContextError::NoSummary(screen.slug().to_string()))?;
        let segments = resolve_segments(summary.endpoint, "", self.patient())?;

        let blob = self.merge_summary_values(schema, summary.shape, values).await?;
        let previous = self.context(screen).await?;

        let call = match summary.shape {
            SummaryShape::Intake => SuggestionCall::post(segments, intake_body(&previous)),
            SummaryShape::Inputs => SuggestionCall::post(
                segments,
                json!({"previous": previous.to_value(), "inputs": blob}),
            ),
            SummaryShape::IntakeInputs => {
                SuggestionCall::post(segments, intake_inputs_body(&previous, &blob))
            }
            SummaryShape::Assessments { .. } => SuggestionCall::post(
                segments,
                json!({"previous": previous.to_value(), "assessments": blob}),
            ),
            SummaryShape::PlanDetails => {
                SuggestionCall::post(segments, json!({"previous": previous.to_value()}))
            }
            SummaryShape::Bare => SuggestionCall::get(segments),
        };

        info!(screen = %screen, path = %call.path(), "requesting summary");
        let outcome = self.transport.request(&call).await;
        Ok(self.render(&OutputTarget::dialog(summary.title), ErrorSurface::Alert, outcome))
    }

    async fn write_field(&self, schema: &ScreenSchema, spec: &FieldSpec, value: &str) -> Result<ScreenBlob> {
        match spec.write {
            WriteMode::Skip => self.store.get(schema.blob).await,
            WriteMode::Plain => {
                merge_field(self.store.as_ref(), schema.blob, spec.name, Value::from(value)).await
            }
            WriteMode::Choice => {
                let mut blob = self.store.get(schema.blob).await?;
                entry_object(&mut blob, spec.name).insert("choice".into(), Value::from(value));
                self.store.set(schema.blob, &blob).await?;
                Ok(blob)
            }
        }
    }

    async fn merge_summary_values(
        &self,
        schema: &ScreenSchema,
        shape: SummaryShape,
        values: &BTreeMap<String, String>,
    ) -> Result<ScreenBlob> {
        if let Some(allowed) = summary_keys(schema, shape) {
            if let Some(stray) = values.keys().find(|k| !allowed.iter().any(|a| *a == k.as_str())) {
                return Err(ContextError::UnknownField {
                    screen: schema.screen.slug().to_string(),
                    field: stray.clone(),
                });
            }
        }

        let mut blob = self.store.get(schema.blob).await?;
        match shape {
            SummaryShape::Intake | SummaryShape::Inputs | SummaryShape::IntakeInputs => {
                for (field, value) in values {
                    blob.insert(field.clone(), Value::from(value.trim()));
                }
            }
            SummaryShape::Assessments { detail_fields } => {
                for field in detail_fields {
                    let details = values
                        .get(&format!("{field}_details"))
                        .map(|d| d.trim())
                        .unwrap_or_default();
                    set_details(&mut blob, field, details);
                }
            }
            SummaryShape::PlanDetails => {
                let details = values.get("plan_details").map(|d| d.trim()).unwrap_or_default();
                set_details(&mut blob, "plan", details);
            }
            SummaryShape::Bare => return Ok(blob),
        }
        self.store.set(schema.blob, &blob).await?;
        Ok(blob)
    }

    fn render(&self, target: &OutputTarget, errors: ErrorSurface, outcome: Result<String>) -> Rendered {
        let rendered = match outcome {
            Ok(text) => Rendered::Text(text),
            Err(ContextError::NoSuggestion) => Rendered::Text(NO_SUGGESTION.to_string()),
            Err(e) => {
                warn!(output = %target.id, err = %e, "suggestion failed");
                Rendered::Error(e.to_string())
            }
        };
        match (&rendered, errors) {
            (Rendered::Error(_), ErrorSurface::Alert) => self.surface.show(&OutputTarget::alert(), &rendered),
            _ => self.surface.show(target, &rendered),
        }
        rendered
    }

    fn issue(&self, target: &str) -> u64 {
        let mut generations = self.generations.lock().unwrap_or_else(|e| e.into_inner());
        let latest = generations.entry(target.to_string()).or_insert(0);
        *latest += 1;
        *latest
    }

    fn is_latest(&self, target: &str, ticket: u64) -> bool {
        if !self.discard_superseded {
            return true;
        }
        let generations = self.generations.lock().unwrap_or_else(|e| e.into_inner());
        generations.get(target).copied() == Some(ticket)
    }
}

// ---------------------------------------------------------------------------
// Payload construction
// ---------------------------------------------------------------------------

fn field_call(
    spec: &FieldSpec,
    segments: Vec<String>,
    previous: &CompositeContext,
    blob: &ScreenBlob,
    value: &str,
    patient: Option<&str>,
) -> SuggestionCall {
    let prev = previous.to_value();
    let body = match spec.payload {
        Payload::Intake => intake_body(previous),
        Payload::IntakeInputs => intake_inputs_body(previous, blob),
        Payload::FieldInputs => {
            let mut inputs = Map::new();
            inputs.insert(spec.name.to_string(), Value::from(value));
            json!({"previous": prev, "inputs": inputs})
        }
        Payload::Selection => json!({"previous": prev, "selection": value}),
        Payload::InputWithCauses { causes_field } => json!({
            "previous": prev,
            "input": value,
            "causes": string_list(blob.get(causes_field)),
        }),
        Payload::FieldText => json!({"previous": prev, "field": spec.name, "text": value}),
        Payload::Value => json!({"previous": prev, "value": value}),
        Payload::PatientInput => json!({"previous": prev, "patient_id": patient, "input": value}),
        Payload::SessionFields { fields } => {
            let mut body = Map::new();
            body.insert("previous".into(), prev);
            for (wire, field) in fields {
                let v = blob.get(*field).cloned().unwrap_or_else(|| Value::from(""));
                body.insert(wire.to_string(), v);
            }
            Value::Object(body)
        }
        Payload::FieldQuery => return SuggestionCall::get(segments).with_query("field", spec.name),
    };
    SuggestionCall::post(segments, body)
}

fn intake_body(ctx: &CompositeContext) -> Value {
    json!({
        "age_sex": ctx.age_sex,
        "present_history": ctx.present_history,
        "past_history": ctx.past_history,
    })
}

fn intake_inputs_body(ctx: &CompositeContext, blob: &ScreenBlob) -> Value {
    let mut body = intake_body(ctx);
    if let Value::Object(map) = &mut body {
        map.insert("inputs".into(), Value::Object(blob.clone()));
    }
    body
}

/// Form keys a summary may merge into the blob; `None` when the shape
/// picks its own keys.
fn summary_keys(schema: &ScreenSchema, shape: SummaryShape) -> Option<Vec<&'static str>> {
    match shape {
        SummaryShape::Intake => Some(INTAKE_FIELDS.to_vec()),
        SummaryShape::Inputs | SummaryShape::IntakeInputs => {
            Some(schema.fields.iter().map(|f| f.name).collect())
        }
        SummaryShape::Assessments { .. } | SummaryShape::PlanDetails | SummaryShape::Bare => None,
    }
}

/// Checkbox groups are stored as arrays; a lone string counts as one entry.
fn string_list(v: Option<&Value>) -> Vec<String> {
    match v {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect(),
        Some(Value::String(s)) if !s.is_empty() => vec![s.clone()],
        _ => Vec::new(),
    }
}

/// The object stored under `field`, replacing any non-object value.
fn entry_object<'a>(blob: &'a mut ScreenBlob, field: &str) -> &'a mut Map<String, Value> {
    let entry = blob
        .entry(field.to_string())
        .or_insert_with(|| Value::Object(Map::new()));
    if !entry.is_object() {
        *entry = Value::Object(Map::new());
    }
    match entry {
        Value::Object(map) => map,
        _ => unreachable!("entry was just made an object"),
    }
}

/// Set `{choice, details}` for `field`, keeping an existing choice.
fn set_details(blob: &mut ScreenBlob, field: &str, details: &str) {
    let entry = entry_object(blob, field);
    entry.entry("choice").or_insert_with(|| Value::from(""));
    entry.insert("details".into(), Value::from(details));
}
