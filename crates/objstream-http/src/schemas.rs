//! Schemas, prompts, and endpoint definitions served by the binary.

use std::sync::Arc;

use objstream::{Field, Schema};

use crate::{producer::Endpoint, provider::OutputConstraint};

const CLASSIFIER_SYSTEM: &str = "You are a text classification assistant. Your task is to analyze \
text and return ONLY valid JSON that matches the schema.
Keep the response concise and accurate. The classification should reflect the main theme and \
relevant subtopics of the text.
Confidence scores should reflect how certain you are about each classification.
IMPORTANT: Only return the JSON object, no additional text or explanation.";

const SUMMARIZE_SYSTEM: &str = "You are a text summarization assistant. Create clear, concise \
summaries that capture the key points and main ideas of the provided text. Be concise. Keep \
summaries focused and well-structured. Highlight the most important points and ideas in bold. \
Feel free to use bullet points, as appropriate, to organize the information into key points.";

const IMAGE_SYSTEM: &str = "You are an image analysis assistant. Analyze the provided image and \
return a JSON object with the following structure:
{
  \"description\": string, // A detailed description of the image
  \"objects\": string[], // List of detected objects (simple strings, no confidence scores)
  \"dominantColors\": string[], // List of dominant colors in simple text format (e.g. \"Navy Blue\", \"Forest Green\")
  \"scene\": string, // A short description of the scene/setting
  \"tags\": string[] // Relevant tags/keywords for the image
}

Keep the analysis detailed but concise. The response must be valid JSON.";

const ANALYSIS_DESCRIPTION: &str =
    "A text analysis result containing sentiment, topics, summary, key points, and language";

/// The `TextClassification` document.
#[must_use]
pub fn classification() -> Schema {
    let confidence = || Schema::bounded(0.0, 1.0);
    Schema::object([
        Field::new("category", Schema::String).describe("The main category or theme of the text"),
        Field::new("confidence", confidence()).describe("Confidence score between 0 and 1"),
        Field::new(
            "subcategories",
            Schema::array(Schema::object([
                Field::new("name", Schema::String).describe("Name of the subcategory"),
                Field::new("confidence", confidence()).describe("Confidence score between 0 and 1"),
            ])),
        )
        .describe("List of subcategories with confidence scores"),
        Field::new("explanation", Schema::String)
            .describe("Brief explanation of the classification"),
    ])
    .describe(
        "A classification result containing category, confidence score, subcategories, and \
         explanation",
    )
}

/// Sentiment, topics, summary, key points, and language of a text.
#[must_use]
pub fn analysis() -> Schema {
    Schema::object([
        Field::new(
            "sentiment",
            Schema::enumeration(["positive", "negative", "neutral"]),
        )
        .describe("The sentiment of the text"),
        Field::new("topics", Schema::array(Schema::String))
            .describe("List of main topics discussed in the text"),
        Field::new("summary", Schema::String).describe("A concise summary of the text"),
        Field::new("keyPoints", Schema::array(Schema::String)).describe("Key points from the text"),
        Field::new("language", Schema::String).describe("The language of the text"),
    ])
    .describe(ANALYSIS_DESCRIPTION)
}

/// Description, objects, colors, scene, and tags of an image.
#[must_use]
pub fn image_analysis() -> Schema {
    Schema::object([
        Field::new("description", Schema::String).describe("A detailed description of the image"),
        Field::new("objects", Schema::array(Schema::String))
            .describe("List of detected objects"),
        Field::new("dominantColors", Schema::array(Schema::String))
            .describe("List of dominant colors in simple text format"),
        Field::new("scene", Schema::String).describe("A short description of the scene/setting"),
        Field::new("tags", Schema::array(Schema::String))
            .describe("Relevant tags/keywords for the image"),
    ])
    .describe("An image analysis result")
}

/// Every endpoint the server exposes.
#[derive(Debug, Clone)]
pub struct Endpoints {
    /// `POST /api/classifier`
    pub classifier: Endpoint,
    /// `POST /api/streaming-structured`
    pub streaming_structured: Endpoint,
    /// `POST /api/structured-output`
    pub structured_output: Endpoint,
    /// `POST /api/generate`
    pub generate: Endpoint,
    /// `POST /api/summarize`
    pub summarize: Endpoint,
    /// `POST /api/image-analysis`
    pub image_analysis: Endpoint,
}

impl Default for Endpoints {
    fn default() -> Self {
        let classification = Arc::new(classification());
        let analysis = Arc::new(analysis());
        let analysis_output = OutputConstraint {
            name: "TextAnalysis".to_string(),
            description: Some(ANALYSIS_DESCRIPTION.to_string()),
            schema: analysis,
        };

        Self {
            classifier: Endpoint {
                name: "classifier",
                system: Some(CLASSIFIER_SYSTEM),
                template: "Classify this text:\n{prompt}\n\nReturn ONLY the JSON object.",
                output: Some(OutputConstraint {
                    name: "TextClassification".to_string(),
                    description: classification.description().map(str::to_string),
                    schema: classification,
                }),
                image: false,
                max_tokens: None,
            },
            streaming_structured: Endpoint {
                name: "streaming-structured",
                system: None,
                template: "Analyze the following text and provide structured information about \
                           it:\n\n{prompt}",
                output: Some(analysis_output.clone()),
                image: false,
                max_tokens: None,
            },
            structured_output: Endpoint {
                name: "structured-output",
                system: None,
                template: "Analyze the following text: {prompt}",
                output: Some(analysis_output),
                image: false,
                max_tokens: None,
            },
            generate: Endpoint::text("generate", None),
            summarize: Endpoint::text("summarize", Some(SUMMARIZE_SYSTEM)),
            image_analysis: Endpoint {
                name: "image-analysis",
                system: Some(IMAGE_SYSTEM),
                template: "Please analyze this image and provide a response in the exact JSON \
                           format specified.",
                output: Some(OutputConstraint {
                    name: "ImageAnalysis".to_string(),
                    description: None,
                    schema: Arc::new(image_analysis()),
                }),
                image: true,
                max_tokens: Some(1000),
            },
        }
    }
}
