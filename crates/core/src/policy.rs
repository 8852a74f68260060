//! Deterministic hard-rule reconciliation of LLM2 triage suggestions.
//!
//! The LLM may disagree with the precheck facts extracted in stage one; the
//! rules here always win, and every field they override is recorded as a
//! contradiction for the audit trail.

use serde::{Deserialize, Serialize};

/// Three-valued precheck answer reported by stage one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PolicyPrecheckValue {
    Yes,
    No,
    Unknown,
}

/// Alignment verdict carried in the LLM2 suggestion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PolicyAlignmentValue {
    Yes,
    No,
    Unknown,
    NotRequired,
}

impl PolicyAlignmentValue {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Yes => "yes",
            Self::No => "no",
            Self::Unknown => "unknown",
            Self::NotRequired => "not_required",
        }
    }
}

/// Final accept/deny suggestion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Suggestion {
    Accept,
    Deny,
}

impl Suggestion {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Accept => "accept",
            Self::Deny => "deny",
        }
    }
}

/// Normalized LLM1 precheck inputs consumed by the rules.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicyPrecheck {
    pub excluded_from_eda_flow: bool,
    pub indication_category: String,
    pub labs_required: bool,
    pub labs_pass: PolicyPrecheckValue,
    pub ecg_required: bool,
    pub ecg_present: PolicyPrecheckValue,
    pub pediatric_flag: bool,
}

/// LLM2-provided alignment block prior to reconciliation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicyAlignment {
    pub excluded_request: bool,
    pub labs_ok: PolicyAlignmentValue,
    pub ecg_ok: PolicyAlignmentValue,
    pub pediatric_flag: bool,
    pub notes: Option<String>,
}

/// One field override produced by a rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyContradiction {
    pub rule: String,
    pub field: String,
    pub previous_value: String,
    pub reconciled_value: String,
}

/// Reconciled suggestion plus the contradiction audit entries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicyResult {
    pub suggestion: Suggestion,
    pub alignment: PolicyAlignment,
    pub contradictions: Vec<PolicyContradiction>,
}

fn push_if_changed(
    contradictions: &mut Vec<PolicyContradiction>,
    rule: &str,
    field: &str,
    previous: &str,
    updated: &str,
) {
    if previous == updated {
        return;
    }
    contradictions.push(PolicyContradiction {
        rule: rule.to_owned(),
        field: field.to_owned(),
        previous_value: previous.to_owned(),
        reconciled_value: updated.to_owned(),
    });
}

fn map_required_alignment(value: PolicyPrecheckValue) -> PolicyAlignmentValue {
    if value == PolicyPrecheckValue::No {
        PolicyAlignmentValue::No
    } else {
        PolicyAlignmentValue::Unknown
    }
}

/// Apply the deterministic hard rules, in order:
///
/// 1. excluded request forces deny and `excluded_request=true`;
/// 2. foreign-body indication waives labs and ECG;
/// 3. otherwise required-but-unmet labs/ECG force deny with the alignment
///    downgraded to `no`/`unknown`.
///
/// `pediatric_flag` and `notes` pass through untouched. Identical inputs
/// always yield identical output and contradiction lists.
pub fn reconcile_eda_policy(precheck: &PolicyPrecheck, llm2_suggestion: Suggestion, llm2_alignment: &PolicyAlignment) -> PolicyResult {
    let mut suggestion = llm2_suggestion;
    let mut excluded_request = llm2_alignment.excluded_request;
    let mut labs_ok = llm2_alignment.labs_ok;
    let mut ecg_ok = llm2_alignment.ecg_ok;
    let mut contradictions = Vec::new();

    if precheck.excluded_from_eda_flow {
        push_if_changed(
            &mut contradictions,
            "excluded_request_forces_deny",
            "suggestion",
            suggestion.as_str(),
            Suggestion::Deny.as_str(),
        );
        suggestion = Suggestion::Deny;

        push_if_changed(
            &mut contradictions,
            "excluded_request_forces_alignment",
            "policy_alignment.excluded_request",
            &excluded_request.to_string(),
            "true",
        );
        excluded_request = true;
    }

    if precheck.indication_category == "foreign_body" {
        push_if_changed(
            &mut contradictions,
            "foreign_body_overrides_labs",
            "policy_alignment.labs_ok",
            labs_ok.as_str(),
            PolicyAlignmentValue::NotRequired.as_str(),
        );
        labs_ok = PolicyAlignmentValue::NotRequired;

        push_if_changed(
            &mut contradictions,
            "foreign_body_overrides_ecg",
            "policy_alignment.ecg_ok",
            ecg_ok.as_str(),
            PolicyAlignmentValue::NotRequired.as_str(),
        );
        ecg_ok = PolicyAlignmentValue::NotRequired;
    } else {
        if precheck.labs_required && precheck.labs_pass != PolicyPrecheckValue::Yes {
            let target = map_required_alignment(precheck.labs_pass);
            push_if_changed(
                &mut contradictions,
                "required_labs_must_align",
                "policy_alignment.labs_ok",
                labs_ok.as_str(),
                target.as_str(),
            );
            labs_ok = target;

            push_if_changed(
                &mut contradictions,
                "required_labs_missing_or_failed_forces_deny",
                "suggestion",
                suggestion.as_str(),
                Suggestion::Deny.as_str(),
            );
            suggestion = Suggestion::Deny;
        }

        if precheck.ecg_required && precheck.ecg_present != PolicyPrecheckValue::Yes {
            let target = map_required_alignment(precheck.ecg_present);
            push_if_changed(
                &mut contradictions,
                "required_ecg_must_align",
                "policy_alignment.ecg_ok",
                ecg_ok.as_str(),
                target.as_str(),
            );
            ecg_ok = target;

            push_if_changed(
                &mut contradictions,
                "required_ecg_missing_forces_deny",
                "suggestion",
                suggestion.as_str(),
                Suggestion::Deny.as_str(),
            );
            suggestion = Suggestion::Deny;
        }
    }

    PolicyResult {
        suggestion,
        alignment: PolicyAlignment {
            excluded_request,
            labs_ok,
            ecg_ok,
            pediatric_flag: llm2_alignment.pediatric_flag,
            notes: llm2_alignment.notes.clone(),
        },
        contradictions,
    }
}
