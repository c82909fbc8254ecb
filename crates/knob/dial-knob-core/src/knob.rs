//! Knob definition (builder) and the per-knob runtime record kept in the document arena.

use std::sync::{Arc, Mutex, RwLock};

use dial_api_core::{DimIdx, DimView, HolderHandle, KnobKind, TypedValue, ViewId};
use dial_curve_core::{Curve, HoldPrevious, StringInterpolator};
use serde::{Deserialize, Serialize};

use crate::error::{KnobError, Result};
use crate::links::LinkState;
use crate::value_store::ValueStore;

/// Kind-specific data that travels with a knob and its records.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "Kind")]
pub enum KnobExtra {
    #[default]
    None,
    #[serde(rename_all = "PascalCase")]
    Choice {
        #[serde(default)]
        entries: Vec<String>,
        #[serde(default)]
        helps: Vec<String>,
        /// Label of the selected entry, written on save and used to re-resolve the
        /// index when the entry list changed between sessions.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        choice_label: Option<String>,
    },
    #[serde(rename_all = "PascalCase")]
    Numeric {
        #[serde(default)]
        min: Vec<f64>,
        #[serde(default)]
        max: Vec<f64>,
        #[serde(default)]
        display_min: Vec<f64>,
        #[serde(default)]
        display_max: Vec<f64>,
    },
    #[serde(rename_all = "PascalCase")]
    File {
        #[serde(default)]
        sequences: bool,
    },
    #[serde(rename_all = "PascalCase")]
    Path {
        #[serde(default)]
        multi_path: bool,
    },
    #[serde(rename_all = "PascalCase")]
    Text {
        #[serde(default)]
        multi_line: bool,
        #[serde(default)]
        rich_text: bool,
    },
    #[serde(rename_all = "PascalCase")]
    Parametric {
        #[serde(default)]
        curves: Vec<Curve>,
    },
}

/// Builder describing a knob to create on a holder.
#[derive(Clone, Debug)]
pub struct KnobSpec {
    pub(crate) name: String,
    pub(crate) label: String,
    pub(crate) hint: String,
    pub(crate) kind: KnobKind,
    pub(crate) dimensions: u32,
    pub(crate) defaults: Vec<TypedValue>,
    pub(crate) animation_enabled: bool,
    pub(crate) persistent: bool,
    pub(crate) user_created: bool,
    pub(crate) extra: KnobExtra,
}

impl KnobSpec {
    pub fn new(name: impl Into<String>, kind: KnobKind) -> Self {
        let name = name.into();
        Self {
            label: name.clone(),
            name,
            hint: String::new(),
            kind,
            dimensions: 1,
            defaults: Vec::new(),
            animation_enabled: false,
            persistent: true,
            user_created: false,
            extra: KnobExtra::None,
        }
    }

    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    pub fn hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = hint.into();
        self
    }

    pub fn dimensions(mut self, dimensions: u32) -> Self {
        self.dimensions = dimensions;
        self
    }

    /// Same default for every dimension.
    pub fn default_value(mut self, value: impl Into<TypedValue>) -> Self {
        self.defaults = vec![value.into()];
        self
    }

    pub fn default_values(mut self, values: Vec<TypedValue>) -> Self {
        self.defaults = values;
        self
    }

    pub fn animated(mut self, enabled: bool) -> Self {
        self.animation_enabled = enabled;
        self
    }

    pub fn persistent(mut self, persistent: bool) -> Self {
        self.persistent = persistent;
        self
    }

    pub fn user_created(mut self, user_created: bool) -> Self {
        self.user_created = user_created;
        self
    }

    pub fn extra(mut self, extra: KnobExtra) -> Self {
        self.extra = extra;
        self
    }

    pub fn choices<S: Into<String>>(self, entries: impl IntoIterator<Item = S>) -> Self {
        self.extra(KnobExtra::Choice {
            entries: entries.into_iter().map(Into::into).collect(),
            helps: Vec::new(),
            choice_label: None,
        })
    }

    /// Defaults expanded to one value per dimension, coerced to the knob's storage kind.
    pub(crate) fn resolved_defaults(&self) -> Result<Vec<TypedValue>> {
        let kind = self.kind.value_kind();
        let mut out = Vec::with_capacity(self.dimensions as usize);
        for dim in 0..self.dimensions as usize {
            let v = self
                .defaults
                .get(dim)
                .or_else(|| self.defaults.last())
                .cloned()
                .unwrap_or_else(|| TypedValue::zero(kind));
            let v = dial_api_core::coercion::coerce(&v, kind).ok_or(KnobError::KindMismatch {
                expected: kind,
                found: v.kind(),
            })?;
            out.push(v);
        }
        Ok(out)
    }
}

/// Mutable descriptive state of a knob.
#[derive(Clone, Debug)]
pub(crate) struct KnobMeta {
    pub label: String,
    pub hint: String,
    pub views: Vec<ViewId>,
    pub enabled: Vec<bool>,
    pub secret: bool,
    pub animation_enabled: bool,
    pub persistent: bool,
    pub user_created: bool,
    pub extra: KnobExtra,
    pub string_hook: Arc<dyn StringInterpolator>,
}

pub(crate) struct Knob {
    pub name: String,
    pub kind: KnobKind,
    pub dimensions: u32,
    pub holder: HolderHandle,
    pub meta: RwLock<KnobMeta>,
    pub store: RwLock<ValueStore>,
    pub links: Mutex<LinkState>,
}

impl Knob {
    pub fn new(holder: HolderHandle, spec: KnobSpec) -> Result<Self> {
        if spec.dimensions == 0 {
            return Err(KnobError::NoDimensions);
        }
        let defaults = spec.resolved_defaults()?;
        Ok(Self {
            store: RwLock::new(ValueStore::new(spec.kind.value_kind(), &defaults)),
            meta: RwLock::new(KnobMeta {
                label: spec.label,
                hint: spec.hint,
                views: vec![ViewId::MAIN],
                enabled: vec![true; spec.dimensions as usize],
                secret: false,
                animation_enabled: spec.animation_enabled && spec.kind.can_animate(),
                persistent: spec.persistent,
                user_created: spec.user_created,
                extra: spec.extra,
                string_hook: Arc::new(HoldPrevious),
            }),
            links: Mutex::new(LinkState::default()),
            name: spec.name,
            kind: spec.kind,
            dimensions: spec.dimensions,
            holder,
        })
    }

    pub fn check_dim(&self, dim: DimIdx) -> Result<()> {
        if dim >= self.dimensions {
            return Err(KnobError::DimensionOutOfRange {
                dim,
                dimensions: self.dimensions,
            });
        }
        Ok(())
    }

    /// Map `view` onto a view the knob stores; unknown views read the main view.
    pub fn resolve(&self, dim: DimIdx, view: ViewId) -> Result<DimView> {
        self.check_dim(dim)?;
        let meta = crate::sync::read(&self.meta);
        let view = if meta.views.contains(&view) {
            view
        } else {
            ViewId::MAIN
        };
        Ok(DimView::new(dim, view))
    }

    pub fn animation_enabled(&self) -> bool {
        crate::sync::read(&self.meta).animation_enabled
    }

    pub fn string_hook(&self) -> Arc<dyn StringInterpolator> {
        crate::sync::read(&self.meta).string_hook.clone()
    }

    pub fn views(&self) -> Vec<ViewId> {
        crate::sync::read(&self.meta).views.clone()
    }

    /// Every stored (dim, view) pair, views in their stored order.
    pub fn channels(&self) -> Vec<DimView> {
        let views = self.views();
        views
            .iter()
            .flat_map(|v| (0..self.dimensions).map(move |d| DimView::new(d, *v)))
            .collect()
    }
}
