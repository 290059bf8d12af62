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

//! The tiny slice of GLSL the headless device understands: free-standing
//! uniform declarations and `#error` directives.

/// Returns the names of the uniforms declared outside of blocks, in source
/// order.
pub(super) fn scan_uniforms(source: &str) -> Vec<String> {
    let mut names = Vec::new();
    let mut depth = 0usize;
    for line in source.lines() {
        let line = line.trim();
        let opens = line.matches('{').count();
        let closes = line.matches('}').count();
        if depth == 0 && opens == 0 && line.ends_with(';') {
            let mut tokens = line.trim_end_matches(';').split_whitespace();
            if tokens.any(|t| t == "uniform") {
                if let Some(name) = tokens.last() {
                    let name = name.split('[').next().unwrap_or(name);
                    names.push(name.to_owned());
                }
            }
        }
        depth = (depth + opens).saturating_sub(closes);
    }
    names
}

/// Returns the message of the first `#error` directive, if any.
pub(super) fn find_error_directive(source: &str) -> Option<String> {
    source.lines().find_map(|line| {
        line.trim()
            .strip_prefix("#error")
            .map(|message| message.trim().to_owned())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn block_members_are_not_free_uniforms() {
        let source = "\
#version 430 core
layout(std140) uniform MaterialParameters {
    vec4 _Tint;
    float _Cutoff;
};
uniform sampler2D _Albedo;
layout(location = 4) uniform samplerBuffer LightBuffer;
uniform float Weights[4];
void main() {}
";
        assert_eq!(
            scan_uniforms(source),
            vec!["_Albedo", "LightBuffer", "Weights"]
        );
    }

    #[test]
    fn error_directive_is_reported() {
        assert_eq!(
            find_error_directive("#version 430\n  #error missing normals\n"),
            Some("missing normals".to_owned())
        );
        assert_eq!(find_error_directive("void main() {}"), None);
    }
}
