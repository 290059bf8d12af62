// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use super::{Asset, AssetKind};
use crate::renderer::{ShaderParameterType, ShaderStage, ShaderValue, UniformBlockLayout};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

/// Body of the fragment stage used by depth-only program variants.
pub const EMPTY_FRAGMENT_SOURCE: &str = "void main() {}\n";

/// A parameter declared by a shader program's material block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShaderParameter {
    /// Name of the block member or sampler uniform.
    pub name: String,
    /// GLSL type.
    pub ty: ShaderParameterType,
    /// Value used when a material does not set the parameter.
    pub default: Option<ShaderValue>,
}

/// A shader program asset: stage sources, preprocessor macros and the
/// parameters of its material block.
///
/// Stage sources are opaque GLSL bodies without a `#version` line; the
/// version header and one `#define` per macro are prepended by
/// [`ShaderProgram::compose_stages`].
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ShaderProgram {
    /// A human readable name, used as a debug label.
    pub name: String,
    /// Stage sources.
    pub stages: BTreeMap<ShaderStage, Arc<str>>,
    /// Macros defined in every stage.
    pub macros: BTreeSet<String>,
    /// Material block parameters, in declaration order.
    pub parameters: Vec<ShaderParameter>,
    /// Varyings captured by transform feedback.
    pub feedback_varyings: Vec<String>,
}

impl Asset for ShaderProgram {
    const KIND: AssetKind = AssetKind::ShaderProgram;
}

impl ShaderProgram {
    /// Creates an empty program named `name`.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Sets the source of a stage.
    pub fn with_stage(mut self, stage: ShaderStage, source: impl Into<Arc<str>>) -> Self {
        self.stages.insert(stage, source.into());
        self
    }

    /// Adds a macro.
    pub fn with_macro(mut self, name: impl Into<String>) -> Self {
        self.macros.insert(name.into());
        self
    }

    /// Declares a parameter, replacing any previous declaration of that name.
    pub fn with_parameter(self, name: impl Into<String>, ty: ShaderParameterType) -> Self {
        self.declare(ShaderParameter {
            name: name.into(),
            ty,
            default: None,
        })
    }

    /// Declares a parameter with a default value.
    pub fn with_default(self, name: impl Into<String>, value: ShaderValue) -> Self {
        self.declare(ShaderParameter {
            name: name.into(),
            ty: value.parameter_type(),
            default: Some(value),
        })
    }

    /// Adds a transform feedback varying.
    pub fn with_feedback_varying(mut self, name: impl Into<String>) -> Self {
        self.feedback_varyings.push(name.into());
        self
    }

    fn declare(mut self, parameter: ShaderParameter) -> Self {
        match self.parameters.iter_mut().find(|p| p.name == parameter.name) {
            Some(existing) => *existing = parameter,
            None => self.parameters.push(parameter),
        }
        self
    }

    /// Looks up a declared parameter.
    pub fn parameter(&self, name: &str) -> Option<&ShaderParameter> {
        self.parameters.iter().find(|p| p.name == name)
    }

    /// Computes the material block layout of the declared parameters.
    pub fn uniform_layout(&self) -> UniformBlockLayout {
        UniformBlockLayout::new(self.parameters.iter().map(|p| (p.name.as_str(), p.ty)))
    }

    /// Produces the final source of every stage: version line, one `#define`
    /// per macro, then the body.
    pub fn compose_stages(&self, glsl_version: &str) -> Vec<(ShaderStage, String)> {
        let mut header = format!("#version {glsl_version}\n");
        for name in &self.macros {
            header.push_str("#define ");
            header.push_str(name);
            header.push('\n');
        }
        self.stages
            .iter()
            .map(|(stage, body)| (*stage, format!("{header}{body}")))
            .collect()
    }
}
