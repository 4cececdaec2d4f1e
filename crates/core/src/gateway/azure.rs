//! Azure Cognitive Services speech, over plain REST.
//!
//! One short-lived request per utterance: SSML in, RIFF PCM out for
//! synthesis; WAV in, JSON out for recognition. No SDK, just `reqwest`.

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use crate::gateway::{SpeechError, SpeechGateway};
use crate::voice::SpeakStyle;

const OUTPUT_FORMAT: &str = "riff-24khz-16bit-mono-pcm";

impl From<reqwest::Error> for SpeechError {
    fn from(err: reqwest::Error) -> Self {
        SpeechError::Upstream(err.to_string())
    }
}

/// Speech provider for one Azure region and subscription key.
pub struct AzureSpeech {
    http: reqwest::Client,
    key: String,
    region: String,
}

impl AzureSpeech {
    pub fn new(key: impl Into<String>, region: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            key: key.into(),
            region: region.into(),
        }
    }

    fn tts_url(&self) -> String {
        format!(
            "https://{}.tts.speech.microsoft.com/cognitiveservices/v1",
            self.region
        )
    }

    fn stt_url(&self) -> String {
        format!(
            "https://{}.stt.speech.microsoft.com/speech/recognition/conversation/cognitiveservices/v1?language=ja-JP",
            self.region
        )
    }
}

fn escape_xml(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            other => escaped.push(other),
        }
    }
    escaped
}

fn ssml(text: &str, voice: &str, style: SpeakStyle) -> String {
    format!(
        "<speak version='1.0' xmlns='http://www.w3.org/2001/10/synthesis' \
         xmlns:mstts='https://www.w3.org/2001/mstts' xml:lang='ja-JP'>\
         <voice name='{voice}'>\
         <mstts:express-as style='{style}' styledegree='1.2'>{text}</mstts:express-as>\
         </voice></speak>",
        voice = voice,
        style = style.as_azure(),
        text = escape_xml(text),
    )
}

#[derive(Debug, Deserialize)]
struct SttResponse {
    #[serde(rename = "RecognitionStatus")]
    recognition_status: String,
    #[serde(rename = "DisplayText", default)]
    display_text: String,
}

#[async_trait]
impl SpeechGateway for AzureSpeech {
    async fn synthesize(
        &self,
        text: &str,
        voice: &str,
        style: SpeakStyle,
    ) -> Result<Vec<u8>, SpeechError> {
        let response = self
            .http
            .post(self.tts_url())
            .header("Ocp-Apim-Subscription-Key", &self.key)
            .header("Content-Type", "application/ssml+xml")
            .header("X-Microsoft-OutputFormat", OUTPUT_FORMAT)
            .body(ssml(text, voice, style))
            .send()
            .await?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(SpeechError::Upstream(format!(
                "synthesis returned {status}: {body}"
            )));
        }
        let audio = response.bytes().await?.to_vec();
        debug!(bytes = audio.len(), voice, "synthesized utterance");
        Ok(audio)
    }

    async fn transcribe(&self, audio: &[u8]) -> Result<String, SpeechError> {
        let response = self
            .http
            .post(self.stt_url())
            .header("Ocp-Apim-Subscription-Key", &self.key)
            .header("Content-Type", "audio/wav")
            .body(audio.to_vec())
            .send()
            .await?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(SpeechError::Upstream(format!(
                "recognition returned {status}: {body}"
            )));
        }
        let parsed: SttResponse = response.json().await?;
        if parsed.recognition_status == "Success" && !parsed.display_text.trim().is_empty() {
            Ok(parsed.display_text)
        } else {
            Err(SpeechError::Unrecognized(parsed.recognition_status))
        }
    }
}
