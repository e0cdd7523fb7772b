//! End-to-end flows over the real storage layout.

mod flows;
