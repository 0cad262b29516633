//! User-facing strings. Button labels double as routing triggers, so they
//! must stay byte-identical to what the keyboards send back.

pub const BTN_GENERATE: &str = "🎨 Генерировать";
pub const BTN_ACCOUNT: &str = "📧 Мой аккаунт";
pub const BTN_HELP: &str = "ℹ️ Помощь";
pub const BTN_AUTH: &str = "📧 Авторизоваться по email";

pub const WELCOME_AUTHORIZED: &str = "👋 Добро пожаловать! Выбери действие:";
pub const WELCOME_GUEST: &str = "👋 Добро пожаловать в NeuroArtAI!\nДля начала авторизуйся.";
pub const NOT_AUTHORIZED: &str = "❌ Не авторизован. Используй /start";
pub const AUTH_REQUIRED: &str = "❌ Авторизуйся сначала! /start";
pub const ASK_EMAIL: &str = "📧 Введи свой email:";
pub const EMAIL_INVALID: &str = "❌ Неправильный формат email!\nПопробуй снова /start";
pub const EMAIL_TAKEN: &str =
    "❌ Этот email уже зарегистрирован!\nПопробуй другой email или свяжись с поддержкой.";
pub const SAVE_FAILED: &str = "❌ Ошибка при сохранении. Попробуй ещё раз.";
pub const GENERATION_FAILED: &str = "❌ Ошибка генерации. Попробуй другое описание.";
pub const IMAGE_SENT: &str = "✅ Изображение отправлено! Что дальше?";
pub const USE_MENU: &str = "👆 Используй кнопки ниже!";


pub fn help(daily_limit: u32) -> String {
    format!(
        "🤖 <b>NeuroArtAI Bot</b>\n\n<b>Команды:</b>\n/start - Начать\n/profile - Профиль\n/generate - Генерировать\n/help - Справка\n\n<b>Функции:</b>\n📸 Генерируй AI изображения\n📧 Один email = один аккаунт\n⏰ Лимит: {} в день\n\n<b>Кнопки меню ниже 👇</b>",
        daily_limit
    )
}

pub fn registered(email: &str) -> String {
    format!(
        "✅ Авторизация успешна!\n📧 Email: {}\nТеперь можешь генерировать изображения!",
        escape_html(email)
    )
}

pub fn admin_card(admin_chat_id: i64) -> String {
    format!(
        "👤 <b>Админ аккаунт</b>\n\n🔑 ID: {}\n📊 Статус: НЕОГРАНИЧЕННЫЙ\n\nВыбери действие:",
        admin_chat_id
    )
}

pub fn account_card(email: &str, count: u32, limit: u32, registered_on: &str) -> String {
    format!(
        "👤 <b>Информация аккаунта:</b>\n📧 Email: {}\n📊 Генераций сегодня: {}/{}\n📅 Дата регистрации: {}\n\nВыбери действие:",
        escape_html(email),
        count,
        limit,
        registered_on
    )
}

pub fn quota_exceeded(limit: u32) -> String {
    format!("❌ Лимит достигнут! ({}/{})\nПопробуй завтра.", limit, limit)
}

pub fn ask_prompt(count: u32, limit: u32) -> String {
    format!("🎨 Опиши изображение (сегодня: {}/{}):", count, limit)
}

pub fn prompt_too_short(min_chars: usize) -> String {
    format!(
        "❌ Слишком короткое описание! Минимум {} символа.",
        min_chars
    )
}

pub fn generating(prompt: &str) -> String {
    format!(
        "⏳ Генерирую... (10-30 сек)\n📝 Запрос: {}",
        escape_html(&truncate_chars(prompt, 50))
    )
}

pub fn photo_caption(prompt: &str, count: u32, limit: u32) -> String {
    format!(
        "✨ <b>Готово!</b>\n📝 {}\n📊 {}/{}",
        escape_html(&truncate_chars(prompt, 80)),
        count,
        limit
    )
}

/// First `max` characters of `s` (not bytes: prompts are often Cyrillic).
pub fn truncate_chars(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}

/// Messages go out with HTML parse mode; user text must not break the markup.
pub fn escape_html(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}
