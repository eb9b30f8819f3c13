//! Korean descriptions for OpenWeatherMap condition codes.

pub const UNKNOWN_CONDITION: &str = "알 수 없는 날씨";

static CONDITIONS: &[(u32, &str)] = &[
    // 2xx thunderstorm
    (200, "가벼운 비를 동반한 천둥구름"),
    (201, "비를 동반한 천둥구름"),
    (202, "폭우를 동반한 천둥구름"),
    (210, "약한 천둥구름"),
    (211, "천둥구름"),
    (212, "강한 천둥구름"),
    (221, "불규칙적 천둥구름"),
    (230, "약한 연무를 동반한 천둥구름"),
    (231, "연무를 동반한 천둥구름"),
    (232, "강한 안개비를 동반한 천둥구름"),
    // 3xx drizzle
    (300, "가벼운 안개비"),
    (301, "안개비"),
    (302, "강한 안개비"),
    (310, "가벼운 적은비"),
    (311, "적은비"),
    (312, "강한 적은비"),
    (313, "소나기와 안개비"),
    (314, "강한 소나기와 안개비"),
    (321, "소나기"),
    // 5xx rain
    (500, "약한 비"),
    (501, "중간 비"),
    (502, "강한 비"),
    (503, "매우 강한 비"),
    (504, "극심한 비"),
    (511, "우박"),
    (520, "약한 소나기 비"),
    (521, "소나기 비"),
    (522, "강한 소나기 비"),
    (531, "불규칙적 소나기 비"),
    // 6xx snow
    (600, "가벼운 눈"),
    (601, "눈"),
    (602, "강한 눈"),
    (611, "진눈깨비"),
    (612, "소나기 진눈깨비"),
    (613, "강한 소나기 진눈깨비"),
    (615, "약한 비와 눈"),
    (616, "비와 눈"),
    (620, "약한 소나기 눈"),
    (621, "소나기 눈"),
    (622, "강한 소나기 눈"),
    // 7xx atmosphere
    (701, "박무"),
    (711, "연기"),
    (721, "연무"),
    (731, "모래 먼지"),
    (741, "안개"),
    (751, "모래"),
    (761, "먼지"),
    (762, "화산재"),
    (771, "돌풍"),
    (781, "토네이도"),
    // 800 clear, 80x clouds
    (800, "맑음"),
    (801, "구름 조금"),
    (802, "약간의 구름"),
    (803, "구름 많음"),
    (804, "흐림"),
];

pub fn describe(code: u32) -> &'static str {
    CONDITIONS
        .iter()
        .find(|(c, _)| *c == code)
        .map(|(_, desc)| *desc)
        .unwrap_or(UNKNOWN_CONDITION)
}
