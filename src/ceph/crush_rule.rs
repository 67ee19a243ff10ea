//! CRUSH rules (`/api/crush_rule`)

use crate::client::{segment, ApiRequest, CephClient};
use crate::context::OpContext;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Rule type code for replicated pools
pub const RULE_TYPE_REPLICATED: i64 = 1;
/// Rule type code for erasure-coded pools
pub const RULE_TYPE_ERASURE: i64 = 3;

/// CRUSH rule step operations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrushOp {
    Take,
    ChooseleafFirstn,
    ChooseIndep,
    SetChooseleafTries,
    SetChooseTries,
    Emit,
}

impl CrushOp {
    pub fn as_str(self) -> &'static str {
        match self {
            CrushOp::Take => "take",
            CrushOp::ChooseleafFirstn => "chooseleaf_firstn",
            CrushOp::ChooseIndep => "choose_indep",
            CrushOp::SetChooseleafTries => "set_chooseleaf_tries",
            CrushOp::SetChooseTries => "set_choose_tries",
            CrushOp::Emit => "emit",
        }
    }
}

impl fmt::Display for CrushOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CrushOp {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "take" => Ok(CrushOp::Take),
            "chooseleaf_firstn" => Ok(CrushOp::ChooseleafFirstn),
            "choose_indep" => Ok(CrushOp::ChooseIndep),
            "set_chooseleaf_tries" => Ok(CrushOp::SetChooseleafTries),
            "set_choose_tries" => Ok(CrushOp::SetChooseTries),
            "emit" => Ok(CrushOp::Emit),
            other => Err(Error::UnknownEnum {
                kind: "CRUSH rule op".into(),
                value: other.to_string(),
            }),
        }
    }
}

/// Rule as reported by the dashboard
#[derive(Debug, Clone, Deserialize)]
pub struct CrushRuleInfo {
    pub rule_id: i64,
    pub rule_name: String,
    #[serde(rename = "type", default)]
    pub rule_type: i64,
    #[serde(default)]
    pub steps: Vec<CrushStepInfo>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CrushStepInfo {
    pub op: String,
    #[serde(default)]
    pub item: Option<i64>,
    #[serde(default)]
    pub item_name: Option<String>,
    #[serde(default)]
    pub num: Option<i64>,
    /// Bucket type for choose steps
    #[serde(rename = "type", default)]
    pub bucket_type: Option<String>,
}

impl CrushRuleInfo {
    /// Root bucket and device class from the `take` step.
    ///
    /// Class-restricted rules take a shadow bucket named `<root>~<class>`.
    pub fn root_and_class(&self) -> Option<(String, Option<String>)> {
        let name = self
            .steps
            .iter()
            .find(|s| s.op == CrushOp::Take.as_str())?
            .item_name
            .as_deref()?;
        Some(match name.split_once('~') {
            Some((root, class)) => (root.to_string(), Some(class.to_string())),
            None => (name.to_string(), None),
        })
    }

    /// Bucket type of the first choose step
    pub fn failure_domain(&self) -> Option<String> {
        self.steps
            .iter()
            .find(|s| s.op.starts_with("choose"))
            .and_then(|s| s.bucket_type.clone())
    }
}

/// Body of `POST /api/crush_rule` (replicated rules)
#[derive(Debug, Clone, Serialize)]
pub struct CreateCrushRule {
    pub name: String,
    pub root: String,
    pub failure_domain: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_class: Option<String>,
}

/// CRUSH rule operations
pub struct CrushRules<'a> {
    client: &'a CephClient,
}

impl CephClient {
    pub fn crush_rules(&self) -> CrushRules<'_> {
        CrushRules { client: self }
    }
}

impl CrushRules<'_> {
    pub async fn list(&self, ctx: &OpContext) -> Result<Vec<CrushRuleInfo>> {
        self.client.get(ctx, "crush_rule").await
    }

    pub async fn get(&self, ctx: &OpContext, name: &str) -> Result<CrushRuleInfo> {
        self.client
            .get(ctx, &format!("crush_rule/{}", segment(name)))
            .await
            .map_err(|e| e.into_not_found("CRUSH rule", name))
    }

    pub async fn create(&self, ctx: &OpContext, request: &CreateCrushRule) -> Result<()> {
        self.client
            .execute(ctx, ApiRequest::post("crush_rule").json(request)?)
            .await
    }

    pub async fn delete(&self, ctx: &OpContext, name: &str) -> Result<()> {
        self.client
            .execute(ctx, ApiRequest::delete(format!("crush_rule/{}", segment(name))))
            .await
            .map_err(|e| e.into_not_found("CRUSH rule", name))
    }
}
