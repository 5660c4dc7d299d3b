//! Protocol tests: state image codec, packet codec, response classifier

mod codec_tests;
