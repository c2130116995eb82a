use crate::core::Core;
use anyhow::Result;
use cursive::view::Nameable;
use cursive::views::{Dialog, EditView, LinearLayout, SelectView, TextContent, TextView};
use cursive::Cursive;
use std::sync::Arc;

/// Blocking entry point for the terminal UI, run on its own thread by
/// [`crate::tasks::ui_task`] since `cursive`'s event loop is synchronous.
pub fn run_ui(core: Arc<Core>, balance_content: TextContent) -> Result<()> {
    let mut siv = cursive::default();
    siv.set_user_data(core);

    siv.add_layer(
        Dialog::around(LinearLayout::vertical().child(TextView::new_with_content(balance_content)))
            .title("good-wallet")
            .button("Send", open_send_dialog)
            .button("Quit", |s| s.quit()),
    );

    siv.run();
    Ok(())
}

fn open_send_dialog(siv: &mut Cursive) {
    let Some(core) = siv.user_data::<Arc<Core>>() else {
        return;
    };
    let mut recipients = SelectView::new();
    for contact in &core.config.contacts {
        recipients.add_item(contact.name.clone(), contact.name.clone());
    }

    siv.add_layer(
        Dialog::around(
            LinearLayout::vertical()
                .child(TextView::new("Recipient:"))
                .child(recipients.with_name("recipient"))
                .child(TextView::new("Amount:"))
                .child(EditView::new().with_name("amount")),
        )
        .title("Send payment")
        .button("Send", submit_send)
        .button("Cancel", |s| {
            s.pop_layer();
        }),
    );
}

fn submit_send(siv: &mut Cursive) {
    let recipient = siv
        .call_on_name("recipient", |view: &mut SelectView<String>| {
            view.selection().map(|rc| (*rc).clone())
        })
        .flatten();
    let amount: Option<u64> = siv
        .call_on_name("amount", |view: &mut EditView| view.get_content().parse().ok())
        .flatten();

    let (Some(recipient), Some(amount)) = (recipient, amount) else {
        siv.add_layer(Dialog::info("Pick a recipient and a valid whole-number amount"));
        return;
    };

    let result = siv
        .user_data::<Arc<Core>>()
        .map(|core| core.send_transaction_async(&recipient, amount));

    siv.pop_layer();
    match result {
        Some(Ok(())) => siv.add_layer(Dialog::info("Transaction queued")),
        Some(Err(e)) => siv.add_layer(Dialog::info(format!("Failed to send: {e}"))),
        None => {}
    }
}
