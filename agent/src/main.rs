fn main() {
    neo_heatmap_agent::boot();
}
