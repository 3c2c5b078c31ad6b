use readahead_tools::common::parse_range;

fn main() {
    for sample in ["100", "100:4", "0x20:8", "65535:2", "7:0"] {
        println!("{sample} => {:?}", parse_range(sample));
    }
}
