//! # Help Text
//!
//! Help messages for the bot's commands.
//! Displayed to the user via the `.help` command.

pub const MAIN: &str = concat!(
    "**🤫 Murmur Help**\n",
    "Send any text and it goes to the moderators as an anonymous submission.\n",
    "\n",
    "**📝 Sharing**\n",
    "* submit: Write a submission\n",
    "* cancel: Abort what you started\n",
    "* me: Your stats and achievements\n",
    "\n",
    "**💬 Replying**\n",
    "* Use the comment / reply hints under a post\n",
    "* start comment_[id]: Comment on a post\n",
    "* start reply_[id]: Message the author privately\n"
);

pub const ADMIN: &str = concat!(
    "\n**🛡️ Moderation**\n",
    "* pending: Re-send review cards\n",
    "* stats: Board statistics\n",
    "* msg [user]: Message a user\n",
    "* block [user] / unblock [user]\n",
    "* unpublished: Approved posts missing from the channel\n",
    "* republish [number]: Retry a failed channel post\n",
    "* release [id]: Reopen a submission stuck under review\n"
);
