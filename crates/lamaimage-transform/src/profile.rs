//! Per-tool remote transform configuration.
//!
//! One pipeline component serves every tool variant; the model name, prompt
//! template, and output hint vary by configuration instead of by duplicated
//! components. The intensity parameter is baked into the directive text.

use lamaimage_core::ToolKind;

const DEFAULT_IMAGE_MODEL: &str = "gemini-2.5-flash-image";

const ENHANCE_PROMPT: &str = "Task: Professional AI Image Enhancement. Intensity Level: \
     {intensity}%. Instructions: Upscale and restore details, sharpen edges, and remove \
     noise. Return a high-quality result.";

const REMOVE_BG_PROMPT: &str =
    "Task: Extract the main subject and remove the background. Return only a transparent PNG.";

/// Configuration for one remote tool variant.
#[derive(Debug, Clone)]
pub struct ToolProfile {
    pub model: String,
    pub prompt_template: String,
    /// Optional target aspect ratio hint passed to the endpoint.
    pub aspect_ratio: Option<String>,
}

impl ToolProfile {
    /// Default profile for a remote tool. `None` for the offline compressor.
    pub fn for_tool(tool: ToolKind) -> Option<Self> {
        match tool {
            ToolKind::Compress => None,
            ToolKind::Enhance => Some(ToolProfile {
                model: DEFAULT_IMAGE_MODEL.to_string(),
                prompt_template: ENHANCE_PROMPT.to_string(),
                aspect_ratio: None,
            }),
            ToolKind::RemoveBackground => Some(ToolProfile {
                model: DEFAULT_IMAGE_MODEL.to_string(),
                prompt_template: REMOVE_BG_PROMPT.to_string(),
                aspect_ratio: None,
            }),
        }
    }

    /// Render the directive text, baking the intensity parameter into the
    /// prompt when the template asks for it.
    pub fn directive(&self, param: Option<u8>) -> String {
        let intensity = param.unwrap_or(50).to_string();
        self.prompt_template.replace("{intensity}", &intensity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compress_has_no_profile() {
        assert!(ToolProfile::for_tool(ToolKind::Compress).is_none());
    }

    #[test]
    fn test_enhance_directive_bakes_intensity() {
        let profile = ToolProfile::for_tool(ToolKind::Enhance).unwrap();
        let directive = profile.directive(Some(70));
        assert!(directive.contains("Intensity Level: 70%"));
        assert!(!directive.contains("{intensity}"));
    }

    #[test]
    fn test_remove_bg_directive_is_fixed() {
        let profile = ToolProfile::for_tool(ToolKind::RemoveBackground).unwrap();
        assert_eq!(profile.directive(None), REMOVE_BG_PROMPT);
        // Parameter is ignored by templates without a placeholder.
        assert_eq!(profile.directive(Some(30)), REMOVE_BG_PROMPT);
    }
}
