//! Offline providers.
//!
//! Deterministic stand-ins for every gateway, so the simulator runs end to
//! end with no credentials: canned profiles, a scripted dialogue loop, a
//! fixed evaluation, and a speech gateway that stays silent.

use async_trait::async_trait;

use crate::gateway::{
    Conversation, EvaluationGateway, GatewayError, GenerationGateway, GuestParams, SpeechError,
    SpeechGateway, StaffParams, WorldParams,
};
use crate::profile::{Gender, Guest, PlayerRole, Staff, World};
use crate::review::{Evaluation, GuestReview, LearnBreakdown, LearnCheck, ManagerReview};
use crate::voice::SpeakStyle;

fn or_default(value: &str, fallback: &str) -> String {
    if value.trim().is_empty() {
        fallback.to_string()
    } else {
        value.to_string()
    }
}

/// Generation gateway that fabricates plausible profiles locally.
pub struct MockGeneration;

#[async_trait]
impl GenerationGateway for MockGeneration {
    async fn generate_world(&self, params: &WorldParams) -> Result<World, GatewayError> {
        Ok(World {
            name: or_default(&params.name, "グランドパレス東京"),
            kind: or_default(&params.kind, "シティホテル"),
            season: or_default(&params.season, "冬 (年末年始)"),
            policy: or_default(&params.policy, "返金には支配人の承認が必要"),
            condition: or_default(&params.condition, "特になし"),
            difficulty: or_default(&params.difficulty, "中級"),
            facilities: or_default(&params.facilities, "大浴場、和食レストラン、宴会場"),
            allowed_compensations: "飲み物のサービス、次回利用できる割引券".to_string(),
            constraints: "深夜帯はフロントが一人体制になる".to_string(),
            background_story: "駅前に建って30年になる老舗ホテル。常連客が多い一方、建物の古さに由来するトラブルも絶えない。".to_string(),
            stars: Some(params.stars),
            ..World::default()
        })
    }

    async fn generate_guest(&self, params: &GuestParams) -> Result<Guest, GatewayError> {
        let anger = params.seed_anger(0);
        Ok(Guest {
            name: or_default(&params.name, "田中 一郎"),
            gender: params.gender.unwrap_or(Gender::Male),
            age: or_default(&params.age, "52"),
            job: or_default(&params.job, "会社役員"),
            personality: "せっかちで声が大きいが、筋の通った対応には素直".to_string(),
            initial_mood: params.initial_mood.clone(),
            initial_anger: anger,
            vip_level: or_default(&params.vip_level, "一般"),
            specific_incident: or_default(&params.incident, "部屋の清掃が行き届いていない"),
            default_complaint: "ちょっと!この部屋、掃除されてないじゃないか!".to_string(),
            bio: "出張で月に2回はホテルを利用する。サービスには人一倍うるさい。".to_string(),
            voice_id: None,
        })
    }

    async fn generate_staff(&self, params: &StaffParams) -> Result<Staff, GatewayError> {
        Ok(Staff {
            name: or_default(&params.name, "斎藤 真由美"),
            gender: params.gender,
            role: or_default(&params.role, "フロントスタッフ"),
            experience: or_default(&params.experience, "入社1年目"),
            personality: format!(
                "真面目で礼儀正しいが、{}",
                or_default(&params.weakness, "マニュアルにない事態に弱い")
            ),
            bio: "ホテル業界に憧れて入社。クレーム対応の場数はまだ少ない。".to_string(),
            voice_id: None,
        })
    }

    async fn open_conversation(
        &self,
        instruction: &str,
    ) -> Result<Box<dyn Conversation>, GatewayError> {
        // The observer prompt casts the model as a scriptwriter; detect that
        // and reply in its JSON protocol.
        let replies: Vec<String> = if instruction.contains("脚本家") {
            vec![
                r#"{"role": "guest", "content": "ちょっと!部屋が掃除されていないんだけど!"}"#.to_string(),
                r#"{"role": "staff", "content": "大変申し訳ございません。すぐに清掃の者を手配いたします。"}"#.to_string(),
                r#"{"role": "guest", "content": "チェックインからもう30分も待っているのよ。"}"#.to_string(),
                r#"{"role": "staff", "content": "お待たせしてしまい申し訳ございません。お詫びにお飲み物をご用意いたします。"}"#.to_string(),
            ]
        } else {
            vec![
                "さようでございますか。差し支えなければ、詳しくお聞かせいただけますか。".to_string(),
                "大変申し訳ございません。すぐに確認いたします。".to_string(),
                "かしこまりました。こちらで対応させていただきます。".to_string(),
                "ご不便をおかけいたしました。以後このようなことがないよう徹底いたします。".to_string(),
            ]
        };
        Ok(Box::new(ScriptedConversation::new(replies)))
    }
}

/// Conversation that cycles through a fixed list of replies.
pub struct ScriptedConversation {
    replies: Vec<String>,
    cursor: usize,
}

impl ScriptedConversation {
    pub fn new(replies: Vec<String>) -> Self {
        Self { replies, cursor: 0 }
    }
}

#[async_trait]
impl Conversation for ScriptedConversation {
    async fn send(&mut self, _message: &str) -> Result<String, GatewayError> {
        if self.replies.is_empty() {
            return Err(GatewayError::Malformed {
                reason: "empty completion".to_string(),
            });
        }
        let reply = self.replies[self.cursor % self.replies.len()].clone();
        self.cursor += 1;
        Ok(reply)
    }
}

/// Evaluation gateway returning one fixed, fully populated report.
pub struct MockEvaluation;

#[async_trait]
impl EvaluationGateway for MockEvaluation {
    async fn evaluate(
        &self,
        _transcript: &str,
        _role: PlayerRole,
    ) -> Result<Evaluation, GatewayError> {
        Ok(Evaluation {
            manager_review: ManagerReview {
                score: 75,
                compliance: "ホテルの方針の範囲内で対応できていました。".to_string(),
                overall_comment: "落ち着いた応対でした。解決策の提示までの流れは良かったものの、上席への報告が抜けています。".to_string(),
            },
            learn_breakdown: LearnBreakdown {
                listen: LearnCheck {
                    passed: true,
                    comment: "お客様の話を最後まで聞けていました。".to_string(),
                },
                empathize: LearnCheck {
                    passed: true,
                    comment: "気持ちに寄り添う言葉がありました。".to_string(),
                },
                apologize: LearnCheck {
                    passed: true,
                    comment: "適切なタイミングで謝罪できました。".to_string(),
                },
                resolve: LearnCheck {
                    passed: true,
                    comment: "権限内の解決策を提示できました。".to_string(),
                },
                notify: LearnCheck {
                    passed: false,
                    comment: "上席への報告・引き継ぎがありませんでした。".to_string(),
                },
            },
            guest_review: GuestReview {
                satisfaction: "★★★★☆ (4/5)".to_string(),
                emotional_journey: "最初は苛立っていたが、謝罪と対応で徐々に落ち着いた。".to_string(),
                private_comment: "対応は悪くなかった。また泊まってもいいかな。".to_string(),
            },
        })
    }
}

/// Speech gateway used when Azure is not configured: synthesis yields no
/// clip, transcription reports itself unavailable.
pub struct SilentSpeech;

#[async_trait]
impl SpeechGateway for SilentSpeech {
    async fn synthesize(
        &self,
        _text: &str,
        _voice: &str,
        _style: SpeakStyle,
    ) -> Result<Vec<u8>, SpeechError> {
        Ok(Vec::new())
    }

    async fn transcribe(&self, _audio: &[u8]) -> Result<String, SpeechError> {
        Err(SpeechError::Disabled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rating::parse_stars;

    #[tokio::test]
    async fn test_mock_guest_honors_params() {
        let params = GuestParams {
            name: "高橋 由紀".to_string(),
            severity: 5,
            initial_mood: "激怒 (Furious)".to_string(),
            ..GuestParams::default()
        };
        let guest = MockGeneration.generate_guest(&params).await.expect("guest");
        assert_eq!(guest.name, "高橋 由紀");
        // severity 5 -> 100 + furious 30, clamped to the ceiling.
        assert_eq!(guest.initial_anger, 100);
    }

    #[tokio::test]
    async fn test_scripted_conversation_cycles() {
        let mut conversation = ScriptedConversation::new(vec!["a".to_string(), "b".to_string()]);
        assert_eq!(conversation.send("x").await.expect("reply"), "a");
        assert_eq!(conversation.send("x").await.expect("reply"), "b");
        assert_eq!(conversation.send("x").await.expect("reply"), "a");
    }

    #[tokio::test]
    async fn test_observer_instruction_switches_to_json_script() {
        let conversation = MockGeneration
            .open_conversation("あなたは脚本家です")
            .await
            .expect("open");
        let mut conversation = conversation;
        let first = conversation.send("Next").await.expect("reply");
        let value: serde_json::Value = serde_json::from_str(&first).expect("json");
        assert_eq!(value["role"], "guest");
    }

    #[tokio::test]
    async fn test_mock_evaluation_satisfaction_parses() {
        let report = MockEvaluation
            .evaluate("t", PlayerRole::Staff)
            .await
            .expect("report");
        assert_eq!(parse_stars(&report.guest_review.satisfaction), 4);
        assert!(!report.learn_breakdown.notify.passed);
    }
}
