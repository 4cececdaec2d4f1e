//! System prompt assembly for the three play modes and the evaluator.
//!
//! Everything the model needs to stay in character lives here: persona
//! blocks, hard world constraints, the anger model for the simulated guest,
//! and the JSON contract the evaluator must honor.

use crate::profile::{Guest, PlayerRole, Staff, World};

/// Cue sent to the observer-mode scriptwriter to request the next utterance.
pub const CONTINUE_CUE: &str = "Next";

/// Used when a scenario has no stored date context of its own.
pub const DEFAULT_DATE_CONTEXT: &str = "平日 (Weekday)";

const REALISM_RULES: &str = "\
# 会話のルール
- 日本語のみで応答すること。
- 1回の応答は1発言のみ。地の文やト書きは書かない。
- 話し言葉として自然な長さ(1〜4文程度)に収めること。
- 設定にない事実を勝手に作らない。";

/// Hard constraints the model must not violate, derived from the world's
/// current condition and policy.
pub fn world_logic_block(world: &World) -> String {
    let mut rules = vec![
        format!("- 利用可能な施設: {}。存在しない施設を提案してはならない。", world.facilities),
        format!("- ホテルの方針: {}", world.policy),
    ];
    if world.condition.contains("満室") {
        rules.push("- 満室のため、部屋の変更やアップグレードの提案は不可。".to_string());
    }
    if world.condition.contains("台風") {
        rules.push("- 台風接近中のため、外出を勧める提案は不可。".to_string());
    }
    if !world.constraints.trim().is_empty() {
        rules.push(format!("- {}", world.constraints));
    }
    format!(
        "# 舞台設定 (必ず守ること)\nホテル名: {name} ({kind})\n季節: {season} / 特殊状況: {condition}\n難易度: {difficulty}\n{rules}",
        name = world.name,
        kind = world.kind,
        season = world.season,
        condition = world.condition,
        difficulty = world.difficulty,
        rules = rules.join("\n"),
    )
}

/// Prompt for staff mode: the model plays the complaining guest, the player
/// answers as hotel staff.
pub fn staff_mode(world: &World, guest: &Guest, date_context: &str) -> String {
    format!(
        r#"あなたはホテルの宿泊客「{name}」としてロールプレイを行います。相手はこのホテルのスタッフ(研修中のプレイヤー)です。

# あなたの人物像
- 名前: {name} ({gender_jp}、{age}歳、{job})
- 性格: {personality}
- 会員ランク: {vip}
- 現在の気分: {mood}
- 来訪日: {date_context}
- 抱えている問題: {incident}
- 背景: {bio}

{world_logic}

# 怒りシステム (内部状態)
- あなたの怒りレベルは {anger}/100 から始まる。
- スタッフが誠実に謝罪し、具体的な解決策を示したら 10〜20 下げる。
- 言い訳・たらい回し・無言・規則の棒読みをされたら 20 上げる。
- 怒りレベル 0〜40: 丁寧な口調。41〜70: 苛立ちが混じり、タメ口が出る。71〜100: 敵対的で攻撃的な口調。
- 問題が完全に解決したと感じたら怒りは 0 になり、礼を言って会話を締める。
- 怒りレベルの数値そのものは絶対に口に出さないこと。

{realism}
- あなたは客である。スタッフ側の発言を代弁しない。"#,
        name = guest.name,
        gender_jp = guest.gender.label_jp(),
        age = guest.age,
        job = guest.job,
        personality = guest.personality,
        vip = guest.vip_level,
        mood = guest.initial_mood,
        date_context = date_context,
        incident = guest.specific_incident,
        bio = guest.bio,
        world_logic = world_logic_block(world),
        anger = guest.initial_anger,
        realism = REALISM_RULES,
    )
}

/// Prompt for guest mode: the model plays a staff member, the player raises
/// the complaint.
pub fn guest_mode(world: &World, staff: &Staff, date_context: &str) -> String {
    format!(
        r#"あなたはホテルのスタッフ「{name}」としてロールプレイを行います。相手はこのホテルの宿泊客(プレイヤー)です。

# あなたの人物像
- 名前: {name} ({gender_jp})
- 役職: {role} ({experience})
- 性格: {personality}
- 背景: {bio}
- 本日: {date_context}

{world_logic}

# 応対の義務 (発言の前に必ず確認すること)
- 解決策を提案する前に、上の舞台設定に反していないか確認する。
- 返金や規定外の対応は、ホテルの方針に従い自分の一存で約束しない。
- 自分の権限を超える場合は、確認のため上席に相談する旨を丁寧に伝える。

{realism}
- あなたはスタッフである。常に敬語で応対し、客側の発言を代弁しない。"#,
        name = staff.name,
        gender_jp = staff.gender.label_jp(),
        role = staff.role,
        experience = staff.experience,
        personality = staff.personality,
        bio = staff.bio,
        date_context = date_context,
        world_logic = world_logic_block(world),
        realism = REALISM_RULES,
    )
}

/// Prompt for observer mode: the model writes both sides of the scene, one
/// utterance per cue, as a strict JSON object.
pub fn observer(world: &World, guest: &Guest, staff: &Staff) -> String {
    format!(
        r#"あなたはホテルのクレーム対応シーンを書く脚本家です。ユーザーが「{cue}」と送るたびに、次の1発言だけを進めてください。

# 登場人物
- 客: {guest_name} ({guest_gender}、{guest_age}歳、{guest_job})。気分: {mood}。問題: {incident}
- スタッフ: {staff_name} ({staff_role}、{staff_experience})

{world_logic}

# 出力形式 (厳守)
- 必ず次の形式のJSONオブジェクトのみを出力する:
  {{"role": "guest", "content": "発言内容"}} または {{"role": "staff", "content": "発言内容"}}
- 客とスタッフを自然に交互させ、1回の出力に含める発言は1つだけ。
- JSON以外の文字(説明、コードフェンス、ト書き)を出力しない。
- 会話は謝罪、解決策の提示、確認を経て自然に収束させること。"#,
        cue = CONTINUE_CUE,
        guest_name = guest.name,
        guest_gender = guest.gender.label_jp(),
        guest_age = guest.age,
        guest_job = guest.job,
        mood = guest.initial_mood,
        incident = guest.specific_incident,
        staff_name = staff.name,
        staff_role = staff.role,
        staff_experience = staff.experience,
        world_logic = world_logic_block(world),
    )
}

/// First line of the conversation, spoken by the model before the player
/// has said anything.
pub fn opening_line(role: PlayerRole, guest: &Guest) -> String {
    match role {
        PlayerRole::Staff => {
            let complaint = guest.default_complaint.trim();
            if complaint.is_empty() {
                "すみません、ちょっといいですか！".to_string()
            } else {
                complaint.to_string()
            }
        }
        PlayerRole::Guest => {
            "いらっしゃいませ。フロントでございます。本日はどのようなご用件でしょうか。".to_string()
        }
        PlayerRole::Observer => format!("(フロントに{}様がやってくる)", guest.name),
    }
}

/// Prompt sent to the evaluator after the session, demanding the exact JSON
/// document the review decoder expects.
pub fn evaluation_prompt(transcript: &str, role: PlayerRole) -> String {
    let focus = match role {
        PlayerRole::Staff => {
            "プレイヤーはスタッフ役です。スタッフ(プレイヤー)の応対を評価してください。"
        }
        PlayerRole::Guest => {
            "プレイヤーは客役です。客(プレイヤー)の要望の伝え方と合意形成を評価してください。"
        }
        PlayerRole::Observer => {
            "この会話は自動生成された台本です。台本中のスタッフの応対を評価してください。"
        }
    };
    format!(
        r#"あなたはホテルの支配人として、以下のクレーム対応の記録を採点します。
{focus}

# 会話記録
{transcript}

# 出力形式 (このJSONオブジェクトのみを出力すること)
{{
  "manager_review": {{
    "score": 0から100の整数,
    "compliance": "ホテルの方針・権限を守れていたかの短いコメント",
    "overall_comment": "総評 (日本語で2〜3文)"
  }},
  "learn_breakdown": {{
    "L_listen": {{"passed": true または false, "comment": "傾聴についての一言"}},
    "E_empathize": {{"passed": true または false, "comment": "共感についての一言"}},
    "A_apologize": {{"passed": true または false, "comment": "謝罪についての一言"}},
    "R_resolve": {{"passed": true または false, "comment": "解決策についての一言"}},
    "N_notify": {{"passed": true または false, "comment": "報告・引き継ぎについての一言"}}
  }},
  "guest_review": {{
    "satisfaction": "★★★☆☆ (3/5) の形式",
    "emotional_journey": "客の感情の変化を1〜2文で",
    "private_comment": "客の本音 (口コミ風に)"
  }}
}}"#
    )
}
