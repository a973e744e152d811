//! Declarative description of every workflow screen.
//!
//! Each screen names the blob it owns, the sections of earlier screens its
//! requests carry as `previous`, its suggestion fields, and an optional
//! screen-wide summary.  The controller is generic over these tables.

use std::fmt;
use std::str::FromStr;

use crate::context::Section;
use crate::display::TargetKind;
use crate::error::{ContextError, Result};
use crate::store::names;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Screen {
    Intake,
    Subjective,
    Perspectives,
    InitialPlan,
    PathoMechanism,
    ChronicDisease,
    ClinicalFlags,
    ObjectiveAssessment,
    ProvisionalDiagnosis,
    SmartGoals,
    TreatmentPlan,
    FollowUp,
}

impl Screen {
    /// Workflow order.
    pub const ALL: [Screen; 12] = [
        Screen::Intake,
        Screen::Subjective,
        Screen::Perspectives,
        Screen::InitialPlan,
        Screen::PathoMechanism,
        Screen::ChronicDisease,
        Screen::ClinicalFlags,
        Screen::ObjectiveAssessment,
        Screen::ProvisionalDiagnosis,
        Screen::SmartGoals,
        Screen::TreatmentPlan,
        Screen::FollowUp,
    ];

    pub fn slug(self) -> &'static str {
        match self {
            Screen::Intake => "intake",
            Screen::Subjective => "subjective",
            Screen::Perspectives => "perspectives",
            Screen::InitialPlan => "initial_plan",
            Screen::PathoMechanism => "patho_mechanism",
            Screen::ChronicDisease => "chronic_disease",
            Screen::ClinicalFlags => "clinical_flags",
            Screen::ObjectiveAssessment => "objective_assessment",
            Screen::ProvisionalDiagnosis => "provisional_diagnosis",
            Screen::SmartGoals => "smart_goals",
            Screen::TreatmentPlan => "treatment_plan",
            Screen::FollowUp => "follow_up",
        }
    }

    pub fn schema(self) -> &'static ScreenSchema {
        match self {
            Screen::Intake => &INTAKE,
            Screen::Subjective => &SUBJECTIVE,
            Screen::Perspectives => &PERSPECTIVES,
            Screen::InitialPlan => &INITIAL_PLAN,
            Screen::PathoMechanism => &PATHO_MECHANISM,
            Screen::ChronicDisease => &CHRONIC_DISEASE,
            Screen::ClinicalFlags => &CLINICAL_FLAGS,
            Screen::ObjectiveAssessment => &OBJECTIVE_ASSESSMENT,
            Screen::ProvisionalDiagnosis => &PROVISIONAL_DIAGNOSIS,
            Screen::SmartGoals => &SMART_GOALS,
            Screen::TreatmentPlan => &TREATMENT_PLAN,
            Screen::FollowUp => &FOLLOW_UP,
        }
    }
}

impl fmt::Display for Screen {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.slug())
    }
}

impl FromStr for Screen {
    type Err = ContextError;

    fn from_str(s: &str) -> Result<Self> {
        let wanted = s.trim().replace('-', "_");
        Screen::ALL
            .into_iter()
            .find(|screen| screen.slug() == wanted)
            .ok_or_else(|| ContextError::UnknownScreen(s.to_string()))
    }
}

// ---------------------------------------------------------------------------
// Descriptors
// ---------------------------------------------------------------------------

/// How a field's value is merged into its screen blob on activation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    /// `{field: value}`
    Plain,
    /// `{field: {choice: value}}`, keeping any recorded details.
    Choice,
    /// Value is not persisted.
    Skip,
}

/// Where service and transport failures are shown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSurface {
    /// Modal alert; the field's own target keeps its previous content.
    Alert,
    /// In place of the suggestion text.
    Inline,
}

/// Shape of the request body for a field-level suggestion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Payload {
    /// Flat `{age_sex, present_history, past_history}` from the intake blob.
    Intake,
    /// Flat intake fields plus `inputs: <whole screen blob>`, no `previous`.
    IntakeInputs,
    /// `{previous, inputs: {field: value}}`
    FieldInputs,
    /// `{previous, selection}`
    Selection,
    /// `{previous, input, causes}`; causes are the recorded checkbox group.
    InputWithCauses { causes_field: &'static str },
    /// `{previous, field, text}`
    FieldText,
    /// `{previous, value}`
    Value,
    /// `{previous, patient_id, input}`
    PatientInput,
    /// `{previous, <wire key>: <blob field>, ...}`
    SessionFields { fields: &'static [(&'static str, &'static str)] },
    /// GET with `?field=<name>`, no body.
    FieldQuery,
}

#[derive(Debug, Clone, Copy)]
pub struct FieldSpec {
    pub name: &'static str,
    /// Path template; `{field}` and `{patient_id}` fill whole segments.
    pub endpoint: &'static str,
    pub payload: Payload,
    pub write: WriteMode,
    pub target: TargetKind,
    pub errors: ErrorSurface,
    /// Shown in the target while the request is outstanding.
    pub placeholder: Option<&'static str>,
}

/// Body shape of a screen-wide summary request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SummaryShape {
    /// Flat intake fields, like [`Payload::Intake`].
    Intake,
    /// `{previous, inputs: <screen blob after merging the values>}`
    Inputs,
    /// Flat intake fields plus `inputs`, like [`Payload::IntakeInputs`].
    IntakeInputs,
    /// `{previous, assessments}` after merging `<field>_details` values into
    /// `{choice, details}` entries for each listed field.
    Assessments { detail_fields: &'static [&'static str] },
    /// `{previous}` after storing `plan_details` as `assessments.plan.details`.
    PlanDetails,
    /// GET without a body.
    Bare,
}

#[derive(Debug, Clone, Copy)]
pub struct SummarySpec {
    pub endpoint: &'static str,
    pub shape: SummaryShape,
    /// Dialog title.
    pub title: &'static str,
}

#[derive(Debug)]
pub struct ScreenSchema {
    pub screen: Screen,
    pub blob: &'static str,
    pub sections: &'static [Section],
    pub fields: &'static [FieldSpec],
    pub summary: Option<SummarySpec>,
}

impl ScreenSchema {
    pub fn field(&self, name: &str) -> Result<&FieldSpec> {
        self.fields
            .iter()
            .find(|f| f.name == name)
            .ok_or_else(|| ContextError::UnknownField {
                screen: self.screen.slug().to_string(),
                field: name.to_string(),
            })
    }
}

// ---------------------------------------------------------------------------
// Tables
// ---------------------------------------------------------------------------

const EARLIER: &[Section] = &[Section::Subjective, Section::Perspectives, Section::Assessments];

const fn popup(name: &'static str, endpoint: &'static str, payload: Payload) -> FieldSpec {
    FieldSpec {
        name,
        endpoint,
        payload,
        write: WriteMode::Plain,
        target: TargetKind::Popup,
        errors: ErrorSurface::Alert,
        placeholder: None,
    }
}

const fn thinking(spec: FieldSpec, placeholder: &'static str) -> FieldSpec {
    FieldSpec {
        errors: ErrorSurface::Inline,
        placeholder: Some(placeholder),
        ..spec
    }
}

const fn choice(name: &'static str) -> FieldSpec {
    FieldSpec {
        write: WriteMode::Choice,
        target: TargetKind::Suggestion,
        ..popup(name, "/ai_suggestion/initial_plan/{field}", Payload::Selection)
    }
}

const fn flag(name: &'static str) -> FieldSpec {
    FieldSpec {
        target: TargetKind::Hint,
        ..popup(name, "/ai_suggestion/clinical_flags/{patient_id}/suggest", Payload::FieldText)
    }
}

const fn subjective(name: &'static str) -> FieldSpec {
    popup(name, "/ai_suggestion/subjective/{field}", Payload::IntakeInputs)
}

const fn perspective(name: &'static str) -> FieldSpec {
    popup(name, "/ai_suggestion/perspectives/{field}", Payload::FieldInputs)
}

const fn dx_query(name: &'static str) -> FieldSpec {
    FieldSpec {
        write: WriteMode::Skip,
        ..thinking(
            popup(name, "/provisional_diagnosis_suggest/{patient_id}", Payload::FieldQuery),
            "Thinking…",
        )
    }
}

const fn smart_goal(name: &'static str) -> FieldSpec {
    thinking(popup(name, "/ai_suggestion/smart_goals/{field}", Payload::PatientInput), "Thinking…")
}

const fn treatment(name: &'static str) -> FieldSpec {
    thinking(popup(name, "/ai_suggestion/treatment_plan/{field}", Payload::PatientInput), "Loading…")
}

/// Intake form fields, sent flat by the intake and subjective screens.
pub const INTAKE_FIELDS: &[&str] = &["age_sex", "present_history", "past_history"];

/// Movement assessments whose free-text details join the initial plan summary.
pub const MOVEMENT_FIELDS: &[&str] = &[
    "active_movements",
    "passive_movements",
    "passive_over_pressure",
    "resisted_movements",
    "combined_movements",
    "special_tests",
    "neurodynamic",
];

pub static INTAKE: ScreenSchema = ScreenSchema {
    screen: Screen::Intake,
    blob: names::INTAKE,
    sections: &[],
    fields: &[popup("past_history", "/ai_suggestion/past_questions", Payload::Intake)],
    summary: Some(SummarySpec {
        endpoint: "/ai_suggestion/provisional_diagnosis",
        shape: SummaryShape::Intake,
        title: "Provisional Diagnosis",
    }),
};

pub static SUBJECTIVE: ScreenSchema = ScreenSchema {
    screen: Screen::Subjective,
    blob: names::SUBJECTIVE,
    sections: &[],
    fields: &[
        subjective("body_structure"),
        subjective("body_function"),
        subjective("activity_performance"),
        subjective("activity_capacity"),
        subjective("contextual_environmental"),
        subjective("contextual_personal"),
    ],
    summary: Some(SummarySpec {
        endpoint: "/ai_suggestion/subjective_diagnosis",
        shape: SummaryShape::IntakeInputs,
        title: "Subjective Diagnosis",
    }),
};

pub static PERSPECTIVES: ScreenSchema = ScreenSchema {
    screen: Screen::Perspectives,
    blob: names::PERSPECTIVES,
    sections: &[Section::Subjective, Section::Perspectives],
    fields: &[
        perspective("knowledge"),
        perspective("attribution"),
        perspective("expectation"),
        perspective("consequences_awareness"),
        perspective("locus_of_control"),
        perspective("affective_aspect"),
    ],
    summary: Some(SummarySpec {
        endpoint: "/ai_suggestion/perspectives_diagnosis",
        shape: SummaryShape::Inputs,
        title: "Provisional Impressions",
    }),
};

pub static INITIAL_PLAN: ScreenSchema = ScreenSchema {
    screen: Screen::InitialPlan,
    blob: names::ASSESSMENTS,
    sections: EARLIER,
    fields: &[
        choice("active_movements"),
        choice("passive_movements"),
        choice("passive_over_pressure"),
        choice("resisted_movements"),
        choice("combined_movements"),
        choice("special_tests"),
        choice("neurodynamic"),
    ],
    summary: Some(SummarySpec {
        endpoint: "/ai_suggestion/initial_plan_summary",
        shape: SummaryShape::Assessments { detail_fields: MOVEMENT_FIELDS },
        title: "Assessment Summary & Provisional Dx",
    }),
};

pub static PATHO_MECHANISM: ScreenSchema = ScreenSchema {
    screen: Screen::PathoMechanism,
    blob: names::PATHO,
    sections: EARLIER,
    fields: &[popup("possible_source", "/ai_suggestion/patho/possible_source", Payload::Selection)],
    summary: None,
};

pub static CHRONIC_DISEASE: ScreenSchema = ScreenSchema {
    screen: Screen::ChronicDisease,
    blob: names::CHRONIC,
    sections: EARLIER,
    fields: &[popup(
        "specific_factors",
        "/ai_suggestion/chronic/specific_factors",
        Payload::InputWithCauses { causes_field: "maintenance_causes" },
    )],
    summary: None,
};

pub static CLINICAL_FLAGS: ScreenSchema = ScreenSchema {
    screen: Screen::ClinicalFlags,
    blob: names::CLINICAL_FLAGS,
    sections: EARLIER,
    fields: &[flag("red_flags"), flag("yellow_flags"), flag("black_flags"), flag("blue_flags")],
    summary: None,
};

/// Shares the assessments blob with the initial plan: both record
/// `{choice, details}` entries for the same examination.
pub static OBJECTIVE_ASSESSMENT: ScreenSchema = ScreenSchema {
    screen: Screen::ObjectiveAssessment,
    blob: names::ASSESSMENTS,
    sections: EARLIER,
    fields: &[FieldSpec {
        write: WriteMode::Choice,
        ..thinking(
            popup("plan", "/ai_suggestion/objective_assessment/{field}", Payload::Value),
            "Thinking…",
        )
    }],
    summary: Some(SummarySpec {
        endpoint: "/ai_suggestion/provisional_diagnosis",
        shape: SummaryShape::PlanDetails,
        title: "Provisional Diagnosis",
    }),
};

pub static PROVISIONAL_DIAGNOSIS: ScreenSchema = ScreenSchema {
    screen: Screen::ProvisionalDiagnosis,
    blob: names::PROVISIONAL_DIAGNOSIS,
    sections: EARLIER,
    fields: &[
        dx_query("likelihood"),
        dx_query("structure_fault"),
        dx_query("symptom"),
        dx_query("findings_support"),
        dx_query("findings_reject"),
    ],
    summary: None,
};

pub static SMART_GOALS: ScreenSchema = ScreenSchema {
    screen: Screen::SmartGoals,
    blob: names::SMART_GOALS,
    sections: EARLIER,
    fields: &[
        smart_goal("patient_goal"),
        smart_goal("baseline_status"),
        smart_goal("measurable_outcome"),
        smart_goal("time_duration"),
    ],
    summary: None,
};

pub static TREATMENT_PLAN: ScreenSchema = ScreenSchema {
    screen: Screen::TreatmentPlan,
    blob: names::TREATMENT_PLAN,
    sections: EARLIER,
    fields: &[
        treatment("treatment_plan"),
        treatment("goal_targeted"),
        treatment("reasoning"),
        treatment("reference"),
    ],
    summary: Some(SummarySpec {
        endpoint: "/ai_suggestion/treatment_plan_summary/{patient_id}",
        shape: SummaryShape::Bare,
        title: "Treatment Summary",
    }),
};

pub static FOLLOW_UP: ScreenSchema = ScreenSchema {
    screen: Screen::FollowUp,
    blob: names::FOLLOW_UP,
    sections: EARLIER,
    fields: &[thinking(
        popup(
            "belief_feedback",
            "/ai/followup_suggestion/{patient_id}",
            Payload::SessionFields {
                fields: &[
                    ("session_number", "session_number"),
                    ("session_date", "session_date"),
                    ("grade", "grade"),
                    ("perception", "belief_treatment"),
                    ("feedback", "belief_feedback"),
                ],
            },
        ),
        "Thinking…",
    )],
    summary: None,
};
