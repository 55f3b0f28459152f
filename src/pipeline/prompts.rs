use serde_json::json;

use crate::core::types::{
    BookGenerationRequest, LayoutKind, PhotoAnalysis, PhotoCluster, PhotoMetadata,
    RegenerateTextRequest,
};

/// Builds the text half of each model request. Output is opaque to the
/// pipeline; only the JSON shapes the prompts ask for matter downstream.
pub trait PromptBuilder: Send + Sync {
    fn photo_analysis_prompt(&self, photo_count: usize, metadata: &[PhotoMetadata]) -> String;

    fn narrative_prompt(
        &self,
        request: &BookGenerationRequest,
        analyses: &[PhotoAnalysis],
        clusters: &[PhotoCluster],
    ) -> String;

    fn questions_prompt(
        &self,
        analyses: &[PhotoAnalysis],
        partner_names: &[String],
        relationship_type: &str,
    ) -> String;

    fn regenerate_text_prompt(&self, request: &RegenerateTextRequest) -> String;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct MemoryBookPromptBuilder;

fn compact<T: serde::Serialize>(value: &T) -> String {
    serde_json::to_string(value).unwrap_or_default()
}

impl PromptBuilder for MemoryBookPromptBuilder {
    fn photo_analysis_prompt(&self, photo_count: usize, metadata: &[PhotoMetadata]) -> String {
        let mut text = String::new();
        text.push_str(&format!(
            "You are analysing {photo_count} photos for a memory book. The images are attached in order, numbered from 0.\n"
        ));
        text.push_str("\nPHOTO METADATA:\n");
        for item in metadata {
            text.push_str(&format!(
                "{}. {}x{} {:?} aspect {}\n",
                item.photo_index, item.width, item.height, item.orientation, item.aspect_ratio
            ));
        }
        text.push_str("\nReturn only JSON in this shape:\n");
        text.push_str(
            "{\"photos\":[{\"photo_index\":0,\"description\":\"...\",\"scene_type\":\"...\",\"emotion\":\"...\",\
\"people_count\":0,\"tags\":[],\"suggested_caption\":\"...\",\"story_relevance\":\"...\",\"cluster_id\":0,\
\"estimated_date_hint\":\"\",\"hero_candidate\":false,\"face_regions\":[],\
\"safe_crop_box\":{\"x\":0,\"y\":0,\"w\":1,\"h\":1},\"date_confidence\":0.0}],\
\"clusters\":[{\"cluster_id\":\"0\",\"label_guess\":\"...\",\"label_confidence\":0.0,\"image_ids\":[0],\
\"hero_candidates\":[0],\"cohesion_score\":0.0}]}\n",
        );
        text
    }

    fn narrative_prompt(
        &self,
        request: &BookGenerationRequest,
        analyses: &[PhotoAnalysis],
        clusters: &[PhotoCluster],
    ) -> String {
        let layouts: Vec<&str> = LayoutKind::ALL.iter().map(LayoutKind::as_str).collect();
        let mut text = String::new();
        text.push_str("You are writing a memory book from analysed photos.\n");
        text.push_str(&format!(
            "Vibe: {}. Structure: {}. Relationship: {}. Image density: {:?}.\n",
            request.vibe, request.structure_template, request.relationship_type, request.image_density
        ));
        if !request.partner_names.is_empty() {
            text.push_str(&format!("Names: {}.\n", request.partner_names.join(", ")));
        }
        if !request.special_occasion.is_empty() {
            text.push_str(&format!("Occasion: {}.\n", request.special_occasion));
        }
        if !request.user_story_text.is_empty() {
            text.push_str("\nTHEIR STORY:\n");
            text.push_str(&request.user_story_text);
            text.push('\n');
        }
        for answer in &request.question_answers {
            text.push_str(&format!("Answer {}: {}\n", answer.question_id, answer.answer_text));
        }
        for constraint in &request.constraints {
            text.push_str(&format!("Constraint: {constraint}\n"));
        }
        text.push_str("\nPHOTO ANALYSES:\n");
        text.push_str(&compact(&analyses));
        text.push_str("\n\nCLUSTERS:\n");
        text.push_str(&compact(&clusters));
        text.push_str(&format!(
            "\n\nUse every photo index exactly once. Allowed layout_id values: {}.\n",
            layouts.join(", ")
        ));
        text.push_str("Return only JSON in this shape:\n");
        text.push_str(
            &json!({
                "title": "...",
                "subtitle": "...",
                "dedication": "...",
                "overall_narrative": "...",
                "chapters": [{
                    "chapter_index": 0,
                    "title": "...",
                    "blurb": "...",
                    "spreads": [{
                        "spread_index": 0,
                        "layout_id": "HERO_FULLBLEED",
                        "photo_indices": [0],
                        "heading_text": "",
                        "body_text": "",
                        "caption_text": "",
                        "quote_text": ""
                    }]
                }],
                "closing_page": {"text": "..."},
                "metadata": {"vibe": request.vibe, "template": request.structure_template}
            })
            .to_string(),
        );
        text.push('\n');
        text
    }

    fn questions_prompt(
        &self,
        analyses: &[PhotoAnalysis],
        partner_names: &[String],
        relationship_type: &str,
    ) -> String {
        let mut text = String::new();
        text.push_str("Ask up to five short questions that would help tell the story behind these photos.\n");
        text.push_str(&format!("Relationship: {relationship_type}.\n"));
        if !partner_names.is_empty() {
            text.push_str(&format!("Names: {}.\n", partner_names.join(", ")));
        }
        text.push_str("\nPHOTO ANALYSES:\n");
        text.push_str(&compact(&analyses));
        text.push_str("\n\nReturn only JSON in this shape:\n");
        text.push_str(
            "{\"questions\":[{\"question_id\":\"q1\",\"reason\":\"...\",\"question_text\":\"...\",\
\"answer_type\":\"single_choice\",\"choices\":[],\"applies_to\":{}}]}\n",
        );
        text
    }

    fn regenerate_text_prompt(&self, request: &RegenerateTextRequest) -> String {
        let mut text = String::new();
        text.push_str(&format!(
            "Rewrite the {} of chapter {}, spread {} in a memory book.\n",
            request.field_name, request.chapter_index, request.spread_index
        ));
        text.push_str("\nCURRENT TEXT:\n");
        text.push_str(&request.current_text);
        text.push_str("\n\nINSTRUCTION:\n");
        text.push_str(&request.instruction);
        if !request.context.is_empty() {
            text.push_str("\n\nCONTEXT:\n");
            text.push_str(&request.context);
        }
        text.push_str("\n\nReply with the new text only.\n");
        text
    }
}
