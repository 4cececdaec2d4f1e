//! Word pools for randomized scenario parameters.
//!
//! The editors and quick play roll generation parameters from these pools
//! instead of asking the player to type everything. Entries are authored in
//! Japanese because the role play itself is conducted in Japanese.

use rand::Rng;
use rand::seq::IndexedRandom;

use crate::gateway::{GuestParams, StaffParams, WorldParams};
use crate::profile::Gender;

pub const HOTEL_NAMES: [&str; 8] = [
    "グランドパレス東京",
    "海風リゾート沖縄",
    "古都の宿 月見荘",
    "スカイタワーホテル大阪",
    "湖畔ホテル白樺",
    "駅前ビジネスイン仙台",
    "温泉旅館 湯けむり亭",
    "シーサイドホテル鎌倉",
];

pub const HOTEL_TYPES: [&str; 5] = [
    "シティホテル",
    "ビジネスホテル",
    "温泉旅館",
    "リゾートホテル",
    "カプセルホテル",
];

pub const SEASONS: [&str; 5] = [
    "春 (桜のシーズン)",
    "夏 (お盆休み)",
    "秋 (紅葉シーズン)",
    "冬 (年末年始)",
    "梅雨 (閑散期)",
];

pub const SPECIAL_CONDITIONS: [&str; 6] = [
    "満室",
    "改装工事中で一部施設が利用不可",
    "台風接近中",
    "大型団体客が滞在中",
    "スタッフ不足で対応が遅れがち",
    "特になし",
];

pub const DIFFICULTIES: [&str; 4] = ["初級", "中級", "上級", "地獄級"];

pub const FACILITIES: [&str; 8] = [
    "大浴場",
    "屋外プール",
    "フィットネスジム",
    "和食レストラン",
    "ルームサービス (24時間)",
    "コインランドリー",
    "宴会場",
    "キッズルーム",
];

pub const POLICIES: [&str; 5] = [
    "返金には支配人の承認が必要",
    "チェックアウトは11時厳守",
    "ペット同伴不可",
    "客室のアップグレードは空室がある場合のみ",
    "深夜0時以降のルームサービスは軽食のみ",
];

pub const GUEST_NAMES: [&str; 8] = [
    "田中 一郎",
    "佐藤 美咲",
    "鈴木 健太",
    "高橋 由紀",
    "渡辺 修",
    "伊藤 さくら",
    "山本 大輔",
    "中村 恵子",
];

pub const GUEST_JOBS: [&str; 8] = [
    "会社役員",
    "大学生",
    "主婦",
    "医師",
    "ITエンジニア",
    "退職した元教師",
    "動画配信者",
    "プロスポーツ選手",
];

pub const INITIAL_MOODS: [&str; 5] = [
    "普通 (Normal)",
    "不機嫌 (Grumpy)",
    "激怒 (Furious)",
    "冷静 (Calm)",
    "泥酔 (Drunk)",
];

pub const VIP_LEVELS: [&str; 4] = ["一般", "リピーター", "ゴールド会員", "プラチナ会員"];

pub const BOOKING_CHANNELS: [&str; 5] = [
    "公式サイト",
    "OTA (楽天トラベル)",
    "電話予約",
    "旅行代理店",
    "当日飛び込み",
];

pub const DATE_CONTEXTS: [&str; 5] = [
    "平日 (Weekday)",
    "週末 (Weekend)",
    "祝日 (Holiday)",
    "年末年始 (New Year)",
    "お盆 (Obon)",
];

pub const COMPLAINT_TYPES: [&str; 8] = [
    "部屋の清掃が行き届いていない",
    "予約したはずの部屋が見つからない",
    "隣室の騒音がひどい",
    "エアコンが故障している",
    "料金が二重に請求されている",
    "アメニティが不足している",
    "Wi-Fiが繋がらない",
    "予約した部屋タイプと違う部屋に通された",
];

pub const STAFF_NAMES_MALE: [&str; 5] =
    ["木村 拓也", "小林 誠", "加藤 翔太", "吉田 浩二", "松本 隆"];

pub const STAFF_NAMES_FEMALE: [&str; 5] =
    ["斎藤 真由美", "山口 あや", "井上 千夏", "林 美穂", "清水 奈々"];

pub const STAFF_ROLES: [(&str, &str); 5] = [
    ("フロントスタッフ", "入社1年目"),
    ("ベルスタッフ", "入社3ヶ月"),
    ("フロント主任", "経験5年"),
    ("コンシェルジュ", "経験8年"),
    ("支配人", "経験15年"),
];

pub const STAFF_WEAKNESSES: [&str; 4] = [
    "マニュアルにない事態に弱い",
    "緊張すると敬語が乱れる",
    "判断をすぐ上司に委ねてしまう",
    "説明が長くなりがちで要点がぼやける",
];

fn pick(pool: &[&str]) -> String {
    pool.choose(&mut rand::rng())
        .copied()
        .unwrap_or_default()
        .to_string()
}

fn pick_many(pool: &[&str], count: usize) -> String {
    let picked: Vec<&str> = pool
        .choose_multiple(&mut rand::rng(), count)
        .copied()
        .collect();
    picked.join("、")
}

pub fn random_world_params() -> WorldParams {
    let mut rng = rand::rng();
    WorldParams {
        name: pick(&HOTEL_NAMES),
        kind: pick(&HOTEL_TYPES),
        season: pick(&SEASONS),
        stars: rng.random_range(4..=10) as f64 / 2.0,
        facilities: pick_many(&FACILITIES, 3),
        policy: pick(&POLICIES),
        condition: pick(&SPECIAL_CONDITIONS),
        difficulty: pick(&DIFFICULTIES),
    }
}

pub fn random_guest_params() -> GuestParams {
    let mut rng = rand::rng();
    GuestParams {
        name: pick(&GUEST_NAMES),
        gender: None,
        job: pick(&GUEST_JOBS),
        age: rng.random_range(20..=70).to_string(),
        booking_channel: pick(&BOOKING_CHANNELS),
        date_context: pick(&DATE_CONTEXTS),
        incident: pick(&COMPLAINT_TYPES),
        severity: rng.random_range(1..=5),
        vip_level: pick(&VIP_LEVELS),
        initial_mood: pick(&INITIAL_MOODS),
    }
}

pub fn random_staff_params() -> StaffParams {
    let gender = if rand::rng().random_bool(0.5) {
        Gender::Male
    } else {
        Gender::Female
    };
    let (role, experience) = STAFF_ROLES
        .choose(&mut rand::rng())
        .copied()
        .unwrap_or(STAFF_ROLES[0]);
    StaffParams {
        name: random_staff_name(gender),
        gender,
        role: role.to_string(),
        experience: experience.to_string(),
        weakness: pick(&STAFF_WEAKNESSES),
    }
}

pub fn random_staff_name(gender: Gender) -> String {
    match gender {
        Gender::Male => pick(&STAFF_NAMES_MALE),
        Gender::Female => pick(&STAFF_NAMES_FEMALE),
    }
}
