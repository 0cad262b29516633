mod common;

use std::sync::Arc;

use artbot::db;
use artbot::model::Keyboard;
use artbot::poller::UpdateHandler;
use artbot::session::Mode;
use artbot::texts;
use common::*;

#[tokio::test]
async fn guest_with_bad_email_stays_unregistered() {
    let pool = setup_pool().await;
    let images = tempfile::tempdir().unwrap();
    let messenger = RecordingMessenger::default();
    let generator = FakeGenerator::succeeding();
    let mut bot = chat_bot(&pool, Arc::new(messenger.clone()), &generator, images.path());

    bot.handle(&msg(1, 1, "/start")).await.unwrap();
    assert_eq!(
        messenger.last_text(1).await,
        Some((texts::WELCOME_GUEST.to_string(), Some(Keyboard::Auth)))
    );

    bot.handle(&msg(1, 2, texts::BTN_AUTH)).await.unwrap();
    assert_eq!(bot.mode(1), Mode::AwaitingEmail);
    assert_eq!(messenger.last_text(1).await.unwrap().0, texts::ASK_EMAIL);

    bot.handle(&msg(1, 3, "definitely not an email")).await.unwrap();
    assert_eq!(bot.mode(1), Mode::Idle);
    assert_eq!(messenger.last_text(1).await.unwrap().0, texts::EMAIL_INVALID);

    bot.handle(&msg(1, 4, "/start")).await.unwrap();
    assert_eq!(
        messenger.last_text(1).await,
        Some((texts::WELCOME_GUEST.to_string(), Some(Keyboard::Auth)))
    );
    assert!(db::get_profile(&pool, 1).await.unwrap().is_none());
}

#[tokio::test]
async fn exhausted_quota_never_reaches_generator() {
    let pool = setup_pool().await;
    let images = tempfile::tempdir().unwrap();
    let messenger = RecordingMessenger::default();
    let generator = FakeGenerator::succeeding();
    let mut bot = chat_bot(&pool, Arc::new(messenger.clone()), &generator, images.path());
    register(&pool, 2, "full@example.com", 10).await;

    bot.handle(&msg(2, 1, texts::BTN_GENERATE)).await.unwrap();
    assert_eq!(
        messenger.last_text(2).await.unwrap().0,
        texts::quota_exceeded(10)
    );
    assert_eq!(bot.mode(2), Mode::Idle);

    // Free text afterwards is not taken as a prompt.
    bot.handle(&msg(2, 2, "a castle at dawn")).await.unwrap();
    assert!(generator.calls().await.is_empty());
    assert_eq!(db::get_profile(&pool, 2).await.unwrap().unwrap().count, 10);
}

#[tokio::test]
async fn short_prompt_is_rejected_without_spending_quota() {
    let pool = setup_pool().await;
    let images = tempfile::tempdir().unwrap();
    let messenger = RecordingMessenger::default();
    let generator = FakeGenerator::succeeding();
    let mut bot = chat_bot(&pool, Arc::new(messenger.clone()), &generator, images.path());
    register(&pool, 3, "short@example.com", 0).await;

    bot.handle(&msg(3, 1, "/generate")).await.unwrap();
    assert_eq!(bot.mode(3), Mode::AwaitingPrompt);
    assert_eq!(messenger.last_text(3).await.unwrap().0, texts::ask_prompt(0, 10));

    bot.handle(&msg(3, 2, "hi")).await.unwrap();
    assert_eq!(
        messenger.last_text(3).await.unwrap().0,
        texts::prompt_too_short(3)
    );
    assert_eq!(bot.mode(3), Mode::Idle);
    assert!(generator.calls().await.is_empty());
    assert_eq!(db::get_profile(&pool, 3).await.unwrap().unwrap().count, 0);
}

#[tokio::test]
async fn unknown_chat_is_unauthorized_but_admin_is_not() {
    let pool = setup_pool().await;
    let images = tempfile::tempdir().unwrap();
    let messenger = RecordingMessenger::default();
    let generator = FakeGenerator::succeeding();
    let mut bot = chat_bot(&pool, Arc::new(messenger.clone()), &generator, images.path());

    bot.handle(&msg(4, 1, "/profile")).await.unwrap();
    assert_eq!(messenger.last_text(4).await.unwrap().0, texts::NOT_AUTHORIZED);
    bot.handle(&msg(4, 2, "/generate")).await.unwrap();
    assert_eq!(messenger.last_text(4).await.unwrap().0, texts::AUTH_REQUIRED);
    assert_eq!(bot.mode(4), Mode::Idle);

    bot.handle(&msg(ADMIN, 1, "/profile")).await.unwrap();
    assert_eq!(
        messenger.last_text(ADMIN).await.unwrap().0,
        texts::admin_card(ADMIN)
    );
    bot.handle(&msg(ADMIN, 2, "/generate")).await.unwrap();
    assert_eq!(
        messenger.last_text(ADMIN).await.unwrap().0,
        texts::ask_prompt(0, 999)
    );
    assert_eq!(bot.mode(ADMIN), Mode::AwaitingPrompt);

    // Admin generations do not consume anything.
    bot.handle(&msg(ADMIN, 3, "a lighthouse")).await.unwrap();
    assert_eq!(generator.calls().await, vec!["a lighthouse".to_string()]);
    assert!(db::get_profile(&pool, ADMIN).await.unwrap().is_none());
    let photo = messenger
        .sent()
        .await
        .into_iter()
        .find(|s| matches!(s, Sent::Photo { .. }))
        .unwrap();
    assert_eq!(
        photo,
        Sent::Photo {
            chat_id: ADMIN,
            caption: texts::photo_caption("a lighthouse", 0, 999),
        }
    );
}

#[tokio::test]
async fn register_then_generate() {
    let pool = setup_pool().await;
    let images = tempfile::tempdir().unwrap();
    let messenger = RecordingMessenger::default();
    let generator = FakeGenerator::succeeding();
    let mut bot = chat_bot(&pool, Arc::new(messenger.clone()), &generator, images.path());

    bot.handle(&msg(5, 1, texts::BTN_AUTH)).await.unwrap();
    bot.handle(&msg(5, 2, "  New.User@Example.com ")).await.unwrap();
    assert_eq!(
        messenger.last_text(5).await,
        Some((
            texts::registered("new.user@example.com"),
            Some(Keyboard::MainMenu)
        ))
    );
    let profile = db::get_profile(&pool, 5).await.unwrap().unwrap();
    assert_eq!(profile.email, "new.user@example.com");
    assert_eq!(profile.count, 0);

    bot.handle(&msg(5, 3, "/start")).await.unwrap();
    assert_eq!(
        messenger.last_text(5).await,
        Some((
            texts::WELCOME_AUTHORIZED.to_string(),
            Some(Keyboard::MainMenu)
        ))
    );

    messenger.clear().await;
    bot.handle(&msg(5, 4, texts::BTN_GENERATE)).await.unwrap();
    bot.handle(&msg(5, 5, "a red fox in the snow")).await.unwrap();

    assert_eq!(
        generator.calls().await,
        vec!["a red fox in the snow".to_string()]
    );
    assert_eq!(db::get_profile(&pool, 5).await.unwrap().unwrap().count, 1);
    assert_eq!(
        messenger.sent().await,
        vec![
            Sent::Text {
                chat_id: 5,
                text: texts::ask_prompt(0, 10),
                keyboard: None,
            },
            Sent::Text {
                chat_id: 5,
                text: texts::generating("a red fox in the snow"),
                keyboard: None,
            },
            Sent::Photo {
                chat_id: 5,
                caption: texts::photo_caption("a red fox in the snow", 1, 10),
            },
            Sent::Text {
                chat_id: 5,
                text: texts::IMAGE_SENT.to_string(),
                keyboard: Some(Keyboard::MainMenu),
            },
        ]
    );
    let saved = std::fs::read_dir(images.path()).unwrap().count();
    assert_eq!(saved, 1);
}

#[tokio::test]
async fn failed_generation_does_not_count() {
    let pool = setup_pool().await;
    let images = tempfile::tempdir().unwrap();
    let messenger = RecordingMessenger::default();
    let generator = FakeGenerator::failing();
    let mut bot = chat_bot(&pool, Arc::new(messenger.clone()), &generator, images.path());
    register(&pool, 6, "fail@example.com", 2).await;

    bot.handle(&msg(6, 1, "/generate")).await.unwrap();
    bot.handle(&msg(6, 2, "an impossible shape")).await.unwrap();

    assert_eq!(generator.calls().await.len(), 1);
    assert_eq!(
        messenger.last_text(6).await.unwrap().0,
        texts::GENERATION_FAILED
    );
    assert_eq!(db::get_profile(&pool, 6).await.unwrap().unwrap().count, 2);
    assert_eq!(std::fs::read_dir(images.path()).unwrap().count(), 0);
}

#[tokio::test]
async fn email_owned_by_another_chat_is_rejected() {
    let pool = setup_pool().await;
    let images = tempfile::tempdir().unwrap();
    let messenger = RecordingMessenger::default();
    let generator = FakeGenerator::succeeding();
    let mut bot = chat_bot(&pool, Arc::new(messenger.clone()), &generator, images.path());
    register(&pool, 7, "taken@example.com", 0).await;

    bot.handle(&msg(8, 1, texts::BTN_AUTH)).await.unwrap();
    bot.handle(&msg(8, 2, "TAKEN@example.com")).await.unwrap();

    assert_eq!(messenger.last_text(8).await.unwrap().0, texts::EMAIL_TAKEN);
    assert_eq!(bot.mode(8), Mode::Idle);
    assert!(db::get_profile(&pool, 8).await.unwrap().is_none());
}

#[tokio::test]
async fn send_failures_are_swallowed() {
    let pool = setup_pool().await;
    let images = tempfile::tempdir().unwrap();
    let generator = FakeGenerator::succeeding();
    let mut bot = chat_bot(&pool, Arc::new(FailingMessenger), &generator, images.path());
    register(&pool, 9, "quiet@example.com", 0).await;

    bot.handle(&msg(9, 1, "/start")).await.unwrap();
    bot.handle(&msg(9, 2, "/generate")).await.unwrap();
    bot.handle(&msg(9, 3, "a quiet lake")).await.unwrap();

    // The image was still produced and counted even though nothing got delivered.
    assert_eq!(generator.calls().await.len(), 1);
    assert_eq!(db::get_profile(&pool, 9).await.unwrap().unwrap().count, 1);
}

#[tokio::test]
async fn back_to_back_generations_keep_both_images() {
    let pool = setup_pool().await;
    let images = tempfile::tempdir().unwrap();
    let messenger = RecordingMessenger::default();
    let generator = FakeGenerator::succeeding();
    let mut bot = chat_bot(&pool, Arc::new(messenger.clone()), &generator, images.path());
    register(&pool, 10, "twice@example.com", 0).await;

    bot.handle(&msg(10, 1, "/generate")).await.unwrap();
    bot.handle(&msg(10, 2, "a red fox")).await.unwrap();
    bot.handle(&msg(10, 3, "/generate")).await.unwrap();
    bot.handle(&msg(10, 4, "a blue fox")).await.unwrap();

    assert_eq!(generator.calls().await.len(), 2);
    assert_eq!(db::get_profile(&pool, 10).await.unwrap().unwrap().count, 2);
    assert_eq!(std::fs::read_dir(images.path()).unwrap().count(), 2);
}
