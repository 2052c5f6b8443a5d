pub const RECIPE_COUNT_PER_PAGE: i64 = 6;
pub const MAX_COUNT_PER_PAGE: i64 = 100;
pub const USER_COUNT_PER_PAGE: i64 = 6;
/// Keeps `offset()` within i64 for any page size.
pub const MAX_PAGE_NUMBER: i64 = i64::MAX / MAX_COUNT_PER_PAGE;
/// Pages listed on each side of the current one.
pub const PAGE_LIST_RADIUS: i64 = 3;

pub const USERNAME_MAX_LENGTH: usize = 150;
pub const EMAIL_MAX_LENGTH: usize = 254;
pub const NAME_MAX_LENGTH: usize = 150;
pub const RECIPE_NAME_MAX_LENGTH: usize = 256;
pub const RESERVED_USERNAMES: &[&str] = &["me"];
pub const USERNAME_SYMBOLS: &[char] = &['.', '@', '+', '-', '_'];

pub const MIN_COOKING_TIME: i32 = 1;
/// NUMERIC(9, 3)
pub const AMOUNT_MAX_DIGITS: u32 = 9;
pub const AMOUNT_MAX_SCALE: u32 = 3;

pub const SHORT_CODE_LENGTH: usize = 8;
pub const SHORT_LINK_PATH: &str = "/s/";
pub const SHORT_CODE_ATTEMPTS: usize = 5;

pub const SESSION_HEADER_PREFIX: &str = "Token ";

pub const SHOPPING_LIST_FILE_NAME: &str = "shopping_list.txt";
pub const SHOPPING_LIST_CONTENT_TYPE: &str = "text/plain; charset=utf-8";

pub const MONTHS: &[&str] = &[
    "января",
    "февраля",
    "марта",
    "апреля",
    "мая",
    "июня",
    "июля",
    "августа",
    "сентября",
    "октября",
    "ноября",
    "декабря",
];

pub const TRUE_VALUES: &[&str] = &["1", "true", "t", "yes"];
