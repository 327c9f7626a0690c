//! 에러 코드 상수 정의
//!
//! 프레젠테이션 레이어에서 i18n 처리를 위해 에러 코드를 문자열로 반환합니다.

/// 소스 경로가 존재하지 않거나 디렉토리가 아님
pub const ERR_INVALID_SOURCE: &str = "ERR_INVALID_SOURCE";

/// 대상 경로가 존재하지 않거나 디렉토리가 아님
pub const ERR_INVALID_DESTINATION: &str = "ERR_INVALID_DESTINATION";

/// 볼륨 정보를 조회할 수 없음
pub const ERR_PATH_UNAVAILABLE: &str = "ERR_PATH_UNAVAILABLE";

/// 백업 주기 입력이 잘못됨
pub const ERR_INVALID_INTERVAL: &str = "ERR_INVALID_INTERVAL";

/// 복사/읽기/쓰기 실패
pub const ERR_IO: &str = "ERR_IO";

/// Watch 시작 실패
pub const ERR_WATCH_START_FAILED: &str = "ERR_WATCH_START_FAILED";

/// 감시 중 루트 디렉토리 소실
pub const ERR_WATCH_ROOT_LOST: &str = "ERR_WATCH_ROOT_LOST";

/// 설정 파일 읽기/쓰기 실패
pub const ERR_CONFIG: &str = "ERR_CONFIG";

/// 비동기 런타임 없이 타이머 시작 시도
pub const ERR_NO_RUNTIME: &str = "ERR_NO_RUNTIME";
