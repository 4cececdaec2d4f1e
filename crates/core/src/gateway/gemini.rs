//! Gemini-backed generation and evaluation.
//!
//! Talks to Gemini through its OpenAI-compatible endpoint, so the client
//! stack is plain `async-openai` with a custom base URL. Profile requests
//! pin the response format to JSON; dialogue requests stay free-form.

use async_openai::Client;
use async_openai::config::OpenAIConfig;
use async_openai::error::OpenAIError;
use async_openai::types::{
    ChatCompletionRequestAssistantMessageArgs, ChatCompletionRequestMessage,
    ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
    CreateChatCompletionRequestArgs, ResponseFormat,
};
use async_trait::async_trait;
use rand::Rng;
use tracing::debug;

use crate::gateway::{
    Conversation, EvaluationGateway, GatewayError, GenerationGateway, GuestParams, StaffParams,
    WorldParams, decode_profile,
};
use crate::instruction;
use crate::profile::{Guest, PlayerRole, Staff, World};
use crate::review::Evaluation;

/// OpenAI-compatible entry point of the Gemini API.
pub const GEMINI_OPENAI_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/openai";

impl From<OpenAIError> for GatewayError {
    fn from(err: OpenAIError) -> Self {
        GatewayError::Upstream(err.to_string())
    }
}

/// Generation and evaluation provider backed by a Gemini chat model.
pub struct GeminiGateway {
    client: Client<OpenAIConfig>,
    model: String,
}

impl GeminiGateway {
    pub fn new(config: OpenAIConfig, model: impl Into<String>) -> Self {
        Self {
            client: Client::with_config(config),
            model: model.into(),
        }
    }

    /// One-shot completion pinned to JSON output.
    async fn request_json(&self, prompt: &str) -> Result<String, GatewayError> {
        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .response_format(ResponseFormat::JsonObject)
            .messages([ChatCompletionRequestUserMessageArgs::default()
                .content(prompt)
                .build()?
                .into()])
            .build()?;
        let response = self.client.chat().create(request).await?;
        let content = response
            .choices
            .first()
            .and_then(|choice| choice.message.content.clone())
            .unwrap_or_default();
        if content.trim().is_empty() {
            return Err(GatewayError::Malformed {
                reason: "empty completion".to_string(),
            });
        }
        debug!(chars = content.chars().count(), "received generation payload");
        Ok(content)
    }
}

fn world_prompt(params: &WorldParams) -> String {
    format!(
        r#"ホテルクレーム対応研修の舞台となるホテルを1つ作成し、JSONオブジェクトのみで出力してください。

# 条件
- ホテル名: {name}
- 種別: {kind}
- 季節: {season}
- 星評価の目安: {stars}
- 施設: {facilities}
- 方針: {policy}
- 特殊状況: {condition}
- 難易度: {difficulty}

# 必須キー
{{"name", "type", "season", "policy", "condition", "difficulty", "facilities", "allowed_compensations", "constraints", "background_story", "stars"}}
- "facilities" と "allowed_compensations" と "constraints" は読み物として自然な日本語の文字列にする。
- "background_story" はこのホテルの背景を2〜3文で。
- "stars" は数値で {stars} にする。"#,
        name = params.name,
        kind = params.kind,
        season = params.season,
        stars = params.stars,
        facilities = params.facilities,
        policy = params.policy,
        condition = params.condition,
        difficulty = params.difficulty,
    )
}

fn guest_prompt(params: &GuestParams, anger: u8) -> String {
    let gender = params
        .gender
        .map(|g| g.label_jp().to_string())
        .unwrap_or_else(|| "名前に合わせて選ぶ".to_string());
    format!(
        r#"ホテルクレーム対応研修に登場する宿泊客を1人作成し、JSONオブジェクトのみで出力してください。

# 条件
- 名前: {name}
- 性別: {gender}
- 年齢: {age}
- 職業: {job}
- 会員ランク: {vip}
- 予約経路: {channel}
- 来訪日: {date}
- 起きた問題: {incident} (深刻度 {severity}/5)
- 初期気分: {mood}

# 必須キー
{{"name", "gender", "age", "job", "personality", "initial_mood", "initial_anger", "vip_level", "specific_incident", "default_complaint", "bio"}}
- "gender" は "male" か "female"。
- "initial_anger" は数値で {anger} にする。
- "specific_incident" は問題を具体的な一場面として書き直す。
- "default_complaint" はこの客が最初に発する一言 (セリフそのもの)。
- "bio" は人物の背景を2〜3文で。"#,
        name = params.name,
        gender = gender,
        age = params.age,
        job = params.job,
        vip = params.vip_level,
        channel = params.booking_channel,
        date = params.date_context,
        incident = params.incident,
        severity = params.severity,
        mood = params.initial_mood,
        anger = anger,
    )
}

fn staff_prompt(params: &StaffParams) -> String {
    format!(
        r#"ホテルクレーム対応研修に登場するスタッフを1人作成し、JSONオブジェクトのみで出力してください。

# 条件
- 名前: {name}
- 性別: {gender}
- 役職: {role}
- 経験: {experience}
- 弱点: {weakness}

# 必須キー
{{"name", "gender", "role", "experience", "personality", "bio"}}
- "gender" は "male" か "female"。
- "personality" には接客上の持ち味と弱点の両方を織り込む。
- "bio" は経歴を2〜3文で。"#,
        name = params.name,
        gender = params.gender.label_jp(),
        role = params.role,
        experience = params.experience,
        weakness = params.weakness,
    )
}

#[async_trait]
impl GenerationGateway for GeminiGateway {
    async fn generate_world(&self, params: &WorldParams) -> Result<World, GatewayError> {
        let raw = self.request_json(&world_prompt(params)).await?;
        let mut world: World = decode_profile(&raw)?;
        if world.name.trim().is_empty() {
            world.name = params.name.clone();
        }
        Ok(world)
    }

    async fn generate_guest(&self, params: &GuestParams) -> Result<Guest, GatewayError> {
        let jitter = rand::rng().random_range(-10..=10);
        let anger = params.seed_anger(jitter);
        let raw = self.request_json(&guest_prompt(params, anger)).await?;
        let mut guest: Guest = decode_profile(&raw)?;
        if guest.name.trim().is_empty() {
            guest.name = params.name.clone();
        }
        // The seeded value is authoritative, whatever the model echoed back.
        guest.initial_anger = anger;
        Ok(guest)
    }

    async fn generate_staff(&self, params: &StaffParams) -> Result<Staff, GatewayError> {
        let raw = self.request_json(&staff_prompt(params)).await?;
        let mut staff: Staff = decode_profile(&raw)?;
        if staff.name.trim().is_empty() {
            staff.name = params.name.clone();
        }
        Ok(staff)
    }

    async fn open_conversation(
        &self,
        instruction: &str,
    ) -> Result<Box<dyn Conversation>, GatewayError> {
        Ok(Box::new(GeminiConversation {
            client: self.client.clone(),
            model: self.model.clone(),
            system: instruction.to_string(),
            history: Vec::new(),
        }))
    }
}

#[async_trait]
impl EvaluationGateway for GeminiGateway {
    async fn evaluate(
        &self,
        transcript: &str,
        role: PlayerRole,
    ) -> Result<Evaluation, GatewayError> {
        let raw = self
            .request_json(&instruction::evaluation_prompt(transcript, role))
            .await?;
        decode_profile(&raw)
    }
}

/// One running dialogue. History grows only on successful exchanges, so a
/// failed request can simply be retried.
struct GeminiConversation {
    client: Client<OpenAIConfig>,
    model: String,
    system: String,
    history: Vec<ChatCompletionRequestMessage>,
}

#[async_trait]
impl Conversation for GeminiConversation {
    async fn send(&mut self, message: &str) -> Result<String, GatewayError> {
        let user: ChatCompletionRequestMessage = ChatCompletionRequestUserMessageArgs::default()
            .content(message)
            .build()?
            .into();

        let mut messages: Vec<ChatCompletionRequestMessage> =
            Vec::with_capacity(self.history.len() + 2);
        messages.push(
            ChatCompletionRequestSystemMessageArgs::default()
                .content(self.system.as_str())
                .build()?
                .into(),
        );
        messages.extend(self.history.iter().cloned());
        messages.push(user.clone());

        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages(messages)
            .build()?;
        let response = self.client.chat().create(request).await?;
        let reply = response
            .choices
            .first()
            .and_then(|choice| choice.message.content.clone())
            .unwrap_or_default();
        if reply.trim().is_empty() {
            return Err(GatewayError::Malformed {
                reason: "empty completion".to_string(),
            });
        }

        self.history.push(user);
        self.history.push(
            ChatCompletionRequestAssistantMessageArgs::default()
                .content(reply.as_str())
                .build()?
                .into(),
        );
        Ok(reply)
    }
}
